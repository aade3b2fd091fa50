/*!
Разбор аргументов командной строки и модель опций.

Здесь три части: плоская неизменяемая запись опций со всеми флагами
([`Options`]), лексический разбор аргументов поверх `lexopt`
([`parse`]) и таблица типов файлов для -t ([`types`]). Запись опций
создаётся один раз фронтендом и дальше только читается.
*/

pub(crate) use crate::flags::{
    options::{
        BinaryFiles, ColorWhen, DeviceAction, DirectoryAction, LoggingMode,
        Options,
    },
    parse::{parse, ParseResult, SpecialMode},
};

mod options;
mod parse;
pub(crate) mod types;

/// Текст краткой справки; показывается по --help и при ошибках
/// использования.
pub(crate) const USAGE: &str =
    "Usage: ug [OPTIONS] [PATTERN] [-e PATTERN] [-f FILE] [FILE ...]";

/// Полная справка по флагам.
pub(crate) fn generate_help() -> String {
    format!(
        "{USAGE}

    -A NUM, --after-context=NUM
            Print NUM lines of trailing context after matching lines.
    -a, --text
            Process a binary file as if it were text.
    -B NUM, --before-context=NUM
            Print NUM lines of leading context before matching lines.
    -b, --byte-offset
            Print the byte offset of each matched line (or match with -g).
    --binary-files=TYPE
            How to handle binary files: 'binary', 'without-match', 'text',
            'hex' or 'with-hex'.
    --break
            Print an empty line and flush after each file with output.
    -C[NUM], --context[=NUM]
            Print NUM (default 2) lines of leading and trailing context.
    -c, --count
            Print only a count of matching lines per file.
    --color[=WHEN], --colour[=WHEN]
            Colorize output; WHEN is 'never', 'always' or 'auto'.
    -D ACTION, --devices=ACTION
            Handle devices, FIFOs and sockets: 'read' or 'skip'.
    -d ACTION, --directories=ACTION
            Handle directories: 'read', 'recurse', 'dereference-recurse'
            or 'skip'.
    -E, --extended-regexp
            Patterns are extended regular expressions (default).
    -e PATTERN, --regexp=PATTERN
            Use PATTERN for matching; may be repeated.
    -F, --fixed-strings
            Patterns are sets of newline-separated literal strings.
    -f FILE, --file=FILE
            Read newline-separated patterns from FILE; tries the GREP_PATH
            directory when FILE does not exist as given.
    --free-space
            Spacing and line breaks in patterns are ignored.
    -G, --basic-regexp
            Patterns are basic regular expressions.
    -g, --no-group
            Do not group matches on the same line; print one line per match.
    --group-separator=SEP
            Separator between groups of context lines (default '--').
    -H, --with-filename
            Print the file name for each match.
    -h, --no-filename
            Never print file names.
    -I
            Ignore matches in binary files.
    -i, --ignore-case
            Case-insensitive matching.
    -J[NUM], --jobs[=NUM]
            Accepted for compatibility; searching is sequential.
    -j, --smart-case
            Case-insensitive matching unless a pattern contains an upper
            case ASCII letter.
    -k, --column-number
            Print the column number of a match (tab-aware, see --tabs).
    -L, --files-without-match
            Print only names of files with no matches.
    -l, --files-with-match
            Print only names of files with matches.
    --label=LABEL
            Name to display for standard input.
    --line-buffered
            Flush output after every line.
    -M MAGIC, --file-magic=MAGIC
            Search only files whose first bytes match the MAGIC regex.
    -m NUM, --max-count=NUM
            Stop searching a file after NUM matches.
    --max-depth=NUM
            Limit recursion depth.
    --max-files=NUM
            Stop after NUM files with matches.
    -N, --only-line-number
            Print only the headers of matching lines.
    -n, --line-number
            Print line numbers.
    --no-group-separator
            Do not print a separator between context groups.
    --no-hidden
            Skip hidden files and directories.
    -O EXTENSIONS, --file-extensions=EXTENSIONS
            Search only files with the listed comma-separated extensions.
    -o, --only-matching
            Print only the matched parts of lines.
    -P, --perl-regexp
            Patterns are Perl regular expressions (requires the 'pcre2'
            build).
    -p, --no-dereference
            Never follow symbolic links.
    --pager[=COMMAND]
            Pipe output through COMMAND (default 'less -R') on a terminal.
    -Q ENCODING, --encoding=ENCODING
            Input encoding: binary, ASCII, ISO-8859-1, EBCDIC, UTF-8,
            UTF-16[BE|LE], UTF-32[BE|LE], CP437, CP850, CP858,
            CP1250..CP1258. Byte offsets then refer to the transcoded
            stream.
    -q, --quiet, --silent
            Print nothing; exit 0 on the first match.
    -R, --dereference-recursive
            Recurse into directories, following symbolic links.
    -r, --recursive
            Recurse into directories.
    -S, --dereference
            Follow symbolic links during recursion.
    -s, --no-messages
            Suppress warnings about unreadable files.
    --separator=SEP
            Field separator for headers (default ':').
    --stats
            Print search statistics at the end.
    -T, --initial-tab
            Align header fields and add a tab before the line.
    -t TYPES, --file-type=TYPES
            Search only files of the listed comma-free TYPES; -tlist shows
            the table.
    --tabs=NUM
            Tab size for column numbers: 1, 2, 4 or 8.
    -U, --binary
            Disable Unicode matching; patterns match raw bytes.
    -V, --version
            Print version information.
    -v, --invert-match
            Select lines that do not match.
    -W, --with-hex
            Print binary matches as hex dumps, text matches as text.
    -w, --word-regexp
            Match whole words only.
    -X, --hex
            Print every match as a hex dump.
    -x, --line-regexp
            Match whole lines only.
    -Y, --empty
            Allow empty-line pattern matches.
    -y, --any-line
            Print every line, non-matching lines as context.
    -Z, --null
            Print a NUL byte after file names.
    -z, --decompress
            Decompress files before searching (external gzip/bzip2/xz/...).
    --debug, --trace
            Enable diagnostic logging.
    --help
            Print this help.
"
    )
}

/// Строка версии для -V.
pub(crate) fn generate_version() -> String {
    format!(
        "ug {}{}",
        env!("CARGO_PKG_VERSION"),
        if cfg!(feature = "pcre2") { " +pcre2" } else { "" },
    )
}
