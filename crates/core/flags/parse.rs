/*!
Разбирает аргументы командной строки в плоскую запись опций.

Лексический разбор делает `lexopt`: короткие опции POSIX со слитным
значением (`-A NUM`, `-ANUM`, `-A=NUM`), длинные GNU-опции
(`--name=VALUE`), `--` как конец опций. Первый позиционный аргумент
становится шаблоном, если до него не встретились ни -e, ни -f; иначе он
считается файлом. Специальные режимы (--help, -V, -tlist) коротко
замыкают разбор.
*/

use std::ffi::{OsStr, OsString};

use anyhow::Context;

use crate::flags::{
    BinaryFiles, ColorWhen, DeviceAction, DirectoryAction, LoggingMode,
    Options,
};
use unigrep_searcher::Encoding;

/// Верхняя граница для --jobs без значения.
const MAX_JOBS: u64 = 1000;

/// Режим, коротко замыкающий обычный запуск.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SpecialMode {
    /// --help: напечатать справку.
    Help,
    /// -V/--version: напечатать версию.
    Version,
    /// -tlist: напечатать таблицу типов файлов.
    TypeList,
}

/// Результат разбора аргументов CLI.
#[derive(Debug)]
pub(crate) enum ParseResult {
    Special(SpecialMode),
    Ok(Options),
    Err(anyhow::Error),
}

/// Разобрать аргументы процесса и нормализовать опции.
///
/// Попутно устанавливает глобальный логгер и уровни диагностики, чтобы
/// --debug действовал уже на сам разбор.
pub(crate) fn parse() -> ParseResult {
    if let Err(err) = crate::logger::Logger::init() {
        return ParseResult::Err(anyhow::anyhow!(
            "не удалось установить логгер: {err}"
        ));
    }
    let mut opts = Options::default();
    let special =
        match parse_args(std::env::args_os().skip(1), &mut opts) {
            Ok(special) => special,
            Err(err) => return ParseResult::Err(err),
        };
    set_log_levels(&opts);
    if let Some(mode) = special {
        return ParseResult::Special(mode);
    }
    if opts.file_type.len() == 1 && opts.file_type[0] == "list" {
        return ParseResult::Special(SpecialMode::TypeList);
    }
    if let Err(err) = opts.finalize() {
        return ParseResult::Err(err);
    }
    // -q подразумевает -s, поэтому уровни выставляются ещё раз.
    set_log_levels(&opts);
    ParseResult::Ok(opts)
}

/// Применить к глобальному состоянию флаги, управляющие диагностикой.
fn set_log_levels(opts: &Options) {
    crate::messages::set_messages(!opts.no_messages);
    match opts.logging {
        Some(LoggingMode::Trace) => {
            log::set_max_level(log::LevelFilter::Trace)
        }
        Some(LoggingMode::Debug) => {
            log::set_max_level(log::LevelFilter::Debug)
        }
        None => log::set_max_level(log::LevelFilter::Warn),
    }
}

/// Разобрать последовательность аргументов в данную запись опций.
///
/// Итератор не должен начинаться с имени исполняемого файла.
fn parse_args<I, O>(
    rawargs: I,
    opts: &mut Options,
) -> anyhow::Result<Option<SpecialMode>>
where
    I: IntoIterator<Item = O>,
    O: Into<OsString>,
{
    use lexopt::Arg;

    let mut parser = lexopt::Parser::from_args(rawargs);
    let mut special = None;
    let mut pattern: Option<OsString> = None;
    while let Some(arg) =
        parser.next().context("недопустимые аргументы командной строки")?
    {
        match arg {
            Arg::Value(value) => {
                // Первый позиционный аргумент — шаблон, пока не заданы
                // ни -e, ни -f; `-` шаблоном не бывает.
                if pattern.is_none()
                    && opts.regexp.is_empty()
                    && opts.file.is_empty()
                    && value != "-"
                {
                    pattern = Some(value);
                } else {
                    opts.infiles.push(value);
                }
            }
            Arg::Short(ch) => match ch {
                'A' => opts.after_context = num(&mut parser, "-A")?,
                'a' => opts.binary_files = BinaryFiles::Text,
                'B' => opts.before_context = num(&mut parser, "-B")?,
                'b' => opts.byte_offset = true,
                'C' => {
                    let n = optional_num(&mut parser, 2, "-C")?;
                    opts.after_context = n;
                    opts.before_context = n;
                }
                'c' => opts.count = true,
                'D' => {
                    opts.devices = parse_devices(&string(&mut parser, "-D")?)?
                }
                'd' => {
                    opts.directories =
                        parse_directories(&string(&mut parser, "-d")?)?
                }
                'E' => opts.basic_regexp = false,
                'e' => opts.regexp.push(string(&mut parser, "-e")?),
                'F' => opts.fixed_strings = true,
                'f' => opts
                    .file
                    .push(os_value(&mut parser, "-f")?.into()),
                'G' => opts.basic_regexp = true,
                'g' => opts.no_group = true,
                'H' => opts.with_filename = true,
                'h' => opts.no_filename = true,
                'I' => opts.binary_files = BinaryFiles::WithoutMatch,
                'i' => opts.ignore_case = true,
                'J' => opts.jobs = optional_num(&mut parser, MAX_JOBS, "-J")?,
                'j' => opts.smart_case = true,
                'k' => opts.column_number = true,
                'L' => opts.files_without_match = true,
                'l' => opts.files_with_match = true,
                'M' => opts.file_magic.push(string(&mut parser, "-M")?),
                'm' => opts.max_count = num(&mut parser, "-m")?,
                'N' => opts.only_line_number = true,
                'n' => opts.line_number = true,
                'O' => {
                    opts.file_extensions.push(string(&mut parser, "-O")?)
                }
                'o' => opts.only_matching = true,
                'P' => {
                    opts.perl_regexp = true;
                    opts.basic_regexp = false;
                }
                'p' => opts.no_dereference = true,
                'Q' => {
                    opts.encoding =
                        parse_encoding(&string(&mut parser, "-Q")?)?
                }
                'q' => opts.quiet = true,
                'R' => opts.directories = DirectoryAction::DereferenceRecurse,
                'r' => opts.directories = DirectoryAction::Recurse,
                'S' => opts.dereference = true,
                's' => opts.no_messages = true,
                'T' => opts.initial_tab = true,
                't' => opts.file_type.push(string(&mut parser, "-t")?),
                'U' => opts.no_unicode = true,
                'V' => special = Some(SpecialMode::Version),
                'v' => opts.invert_match = true,
                'W' => opts.binary_files = BinaryFiles::WithHex,
                'w' => opts.word_regexp = true,
                'X' => opts.binary_files = BinaryFiles::Hex,
                'x' => opts.line_regexp = true,
                'Y' => opts.empty = true,
                'y' => opts.any_line = true,
                'Z' => opts.null = true,
                'z' => opts.decompress = true,
                _ => anyhow::bail!("нераспознанный флаг -{ch}"),
            },
            Arg::Long(name) => match name {
                "after-context" => {
                    opts.after_context = num(&mut parser, "--after-context")?
                }
                "any-line" => opts.any_line = true,
                "basic-regexp" => opts.basic_regexp = true,
                "before-context" => {
                    opts.before_context =
                        num(&mut parser, "--before-context")?
                }
                "binary" => opts.no_unicode = true,
                "binary-files" => {
                    opts.binary_files = parse_binary_files(&string(
                        &mut parser,
                        "--binary-files",
                    )?)?
                }
                "break" => opts.break_output = true,
                "byte-offset" => opts.byte_offset = true,
                "color" | "colour" => {
                    opts.color = Some(parse_color(&optional_string(
                        &mut parser,
                        "auto",
                    ))?)
                }
                "column-number" => opts.column_number = true,
                "context" => {
                    let n = optional_num(&mut parser, 2, "--context")?;
                    opts.after_context = n;
                    opts.before_context = n;
                }
                "count" => opts.count = true,
                "debug" => opts.logging = Some(LoggingMode::Debug),
                "decompress" => opts.decompress = true,
                "dereference" => opts.dereference = true,
                "dereference-recursive" => {
                    opts.directories = DirectoryAction::DereferenceRecurse
                }
                "devices" => {
                    opts.devices =
                        parse_devices(&string(&mut parser, "--devices")?)?
                }
                "directories" => {
                    opts.directories = parse_directories(&string(
                        &mut parser,
                        "--directories",
                    )?)?
                }
                "empty" => opts.empty = true,
                "encoding" => {
                    opts.encoding =
                        parse_encoding(&string(&mut parser, "--encoding")?)?
                }
                "exclude" => {
                    opts.exclude.push(string(&mut parser, "--exclude")?)
                }
                "exclude-dir" => opts
                    .exclude_dir
                    .push(string(&mut parser, "--exclude-dir")?),
                "exclude-from" => opts
                    .exclude_from
                    .push(string(&mut parser, "--exclude-from")?),
                "extended-regexp" => opts.basic_regexp = false,
                "file" => {
                    opts.file.push(os_value(&mut parser, "--file")?.into())
                }
                "file-extensions" => opts
                    .file_extensions
                    .push(string(&mut parser, "--file-extensions")?),
                "file-magic" => opts
                    .file_magic
                    .push(string(&mut parser, "--file-magic")?),
                "file-type" => opts
                    .file_type
                    .push(string(&mut parser, "--file-type")?),
                "files-with-match" => opts.files_with_match = true,
                "files-without-match" => opts.files_without_match = true,
                "fixed-strings" => opts.fixed_strings = true,
                "free-space" => opts.free_space = true,
                "group-separator" => {
                    opts.group_separator =
                        Some(string(&mut parser, "--group-separator")?)
                }
                "help" => special = Some(SpecialMode::Help),
                "hex" => opts.binary_files = BinaryFiles::Hex,
                "ignore-case" => opts.ignore_case = true,
                "include" => {
                    opts.include.push(string(&mut parser, "--include")?)
                }
                "include-dir" => opts
                    .include_dir
                    .push(string(&mut parser, "--include-dir")?),
                "include-from" => opts
                    .include_from
                    .push(string(&mut parser, "--include-from")?),
                "initial-tab" => opts.initial_tab = true,
                "invert-match" => opts.invert_match = true,
                "jobs" => {
                    opts.jobs = optional_num(&mut parser, MAX_JOBS, "--jobs")?
                }
                "label" => opts.label = optional_string(&mut parser, ""),
                "line-buffered" => opts.line_buffered = true,
                "line-number" => opts.line_number = true,
                "line-regexp" => opts.line_regexp = true,
                "max-count" => {
                    opts.max_count = num(&mut parser, "--max-count")?
                }
                "max-depth" => {
                    opts.max_depth = num(&mut parser, "--max-depth")?
                }
                "max-files" => {
                    opts.max_files = num(&mut parser, "--max-files")?
                }
                "no-dereference" => opts.no_dereference = true,
                "no-filename" => opts.no_filename = true,
                "no-group" => opts.no_group = true,
                "no-group-separator" => opts.group_separator = None,
                "no-hidden" => opts.no_hidden = true,
                "no-messages" => opts.no_messages = true,
                "null" => opts.null = true,
                "only-line-number" => opts.only_line_number = true,
                "only-matching" => opts.only_matching = true,
                "pager" => {
                    opts.pager =
                        Some(optional_string(&mut parser, "less -R"))
                }
                "perl-regexp" => {
                    opts.perl_regexp = true;
                    opts.basic_regexp = false;
                }
                "quiet" | "silent" => opts.quiet = true,
                "recursive" => opts.directories = DirectoryAction::Recurse,
                "regexp" => {
                    opts.regexp.push(string(&mut parser, "--regexp")?)
                }
                "separator" => {
                    opts.separator = string(&mut parser, "--separator")?
                }
                "smart-case" => opts.smart_case = true,
                "stats" => opts.stats = true,
                "tabs" => opts.tabs = num(&mut parser, "--tabs")?,
                "text" => opts.binary_files = BinaryFiles::Text,
                "trace" => opts.logging = Some(LoggingMode::Trace),
                "version" => special = Some(SpecialMode::Version),
                "with-filename" => opts.with_filename = true,
                "with-hex" => opts.binary_files = BinaryFiles::WithHex,
                "word-regexp" => opts.word_regexp = true,
                _ => anyhow::bail!("нераспознанный флаг --{name}"),
            },
        }
    }
    // Позиционный шаблон встаёт в начало списка -e; если -e появились
    // позже него, он оказывается первым из файлов.
    if let Some(pattern) = pattern {
        if opts.regexp.is_empty() {
            opts.regexp
                .insert(0, pattern.to_string_lossy().into_owned());
        } else {
            opts.infiles.insert(0, pattern);
        }
    }
    Ok(special)
}

/// Значение флага как OsString.
fn os_value(
    parser: &mut lexopt::Parser,
    flag: &str,
) -> anyhow::Result<OsString> {
    parser
        .value()
        .with_context(|| format!("отсутствует значение у флага {flag}"))
}

/// Строковое значение флага.
fn string(parser: &mut lexopt::Parser, flag: &str) -> anyhow::Result<String> {
    Ok(os_value(parser, flag)?.to_string_lossy().into_owned())
}

/// Числовое значение флага; слитная форма `-A=NUM` оставляет ведущий
/// знак равенства, он здесь снимается.
fn num(parser: &mut lexopt::Parser, flag: &str) -> anyhow::Result<u64> {
    parse_num(&os_value(parser, flag)?, flag)
}

fn parse_num(value: &OsStr, flag: &str) -> anyhow::Result<u64> {
    let text = value.to_string_lossy();
    let text = text.strip_prefix('=').unwrap_or(&text);
    text.parse().with_context(|| {
        format!("недопустимое число у флага {flag}: '{text}'")
    })
}

/// Необязательное числовое значение: только слитная форма, иначе
/// значение по умолчанию.
fn optional_num(
    parser: &mut lexopt::Parser,
    default: u64,
    flag: &str,
) -> anyhow::Result<u64> {
    match parser.optional_value() {
        Some(value) => parse_num(&value, flag),
        None => Ok(default),
    }
}

/// Необязательное строковое значение: только слитная форма.
fn optional_string(parser: &mut lexopt::Parser, default: &str) -> String {
    match parser.optional_value() {
        Some(value) => value.to_string_lossy().into_owned(),
        None => default.to_string(),
    }
}

fn parse_devices(value: &str) -> anyhow::Result<DeviceAction> {
    match value {
        "read" => Ok(DeviceAction::Read),
        "skip" => Ok(DeviceAction::Skip),
        _ => anyhow::bail!(
            "недопустимое --devices={value}, допустимы 'read' и 'skip'"
        ),
    }
}

fn parse_directories(value: &str) -> anyhow::Result<DirectoryAction> {
    match value {
        "read" => Ok(DirectoryAction::Read),
        "recurse" => Ok(DirectoryAction::Recurse),
        "dereference-recurse" => Ok(DirectoryAction::DereferenceRecurse),
        "skip" => Ok(DirectoryAction::Skip),
        _ => anyhow::bail!(
            "недопустимое --directories={value}, допустимы 'read', \
             'recurse', 'dereference-recurse' и 'skip'"
        ),
    }
}

fn parse_binary_files(value: &str) -> anyhow::Result<BinaryFiles> {
    match value {
        "binary" => Ok(BinaryFiles::Binary),
        "without-match" | "without-matches" => Ok(BinaryFiles::WithoutMatch),
        "text" => Ok(BinaryFiles::Text),
        "hex" => Ok(BinaryFiles::Hex),
        "with-hex" => Ok(BinaryFiles::WithHex),
        _ => anyhow::bail!(
            "недопустимое --binary-files={value}, допустимы 'binary', \
             'without-match', 'text', 'hex' и 'with-hex'"
        ),
    }
}

fn parse_color(value: &str) -> anyhow::Result<ColorWhen> {
    match value {
        "never" => Ok(ColorWhen::Never),
        "auto" => Ok(ColorWhen::Auto),
        "always" => Ok(ColorWhen::Always),
        _ => anyhow::bail!(
            "недопустимое --color={value}, допустимы 'never', 'always' и \
             'auto'"
        ),
    }
}

fn parse_encoding(value: &str) -> anyhow::Result<Encoding> {
    Encoding::from_name(value).with_context(|| {
        format!("недопустимое --encoding={value}; см. --help")
    })
}

#[cfg(test)]
pub(crate) fn parse_args_raw(
    rawargs: impl IntoIterator<Item = impl Into<OsString>>,
) -> anyhow::Result<Options> {
    let mut opts = Options::default();
    parse_args(rawargs, &mut opts)?;
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_pattern_and_files() {
        let opts = parse_args_raw(["-n", "foo", "a.txt", "b.txt"]).unwrap();
        assert!(opts.line_number);
        assert_eq!(opts.regexp, vec!["foo"]);
        assert_eq!(opts.infiles, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn attached_and_separate_values() {
        for args in [
            vec!["-A3"],
            vec!["-A", "3"],
            vec!["-A=3"],
            vec!["--after-context=3"],
            vec!["--after-context", "3"],
        ] {
            let opts = parse_args_raw(args).unwrap();
            assert_eq!(opts.after_context, 3);
        }
    }

    #[test]
    fn context_without_value_defaults_to_two() {
        let opts = parse_args_raw(["-C"]).unwrap();
        assert_eq!(opts.after_context, 2);
        assert_eq!(opts.before_context, 2);
        let opts = parse_args_raw(["-C5"]).unwrap();
        assert_eq!(opts.after_context, 5);
    }

    #[test]
    fn grouped_short_flags() {
        let opts = parse_args_raw(["-rni"]).unwrap();
        assert_eq!(opts.directories, DirectoryAction::Recurse);
        assert!(opts.line_number);
        assert!(opts.ignore_case);
    }

    #[test]
    fn late_regexp_demotes_positional_pattern() {
        let opts = parse_args_raw(["foo", "-e", "bar", "x"]).unwrap();
        assert_eq!(opts.regexp, vec!["bar"]);
        assert_eq!(opts.infiles, vec!["foo", "x"]);
    }

    #[test]
    fn dash_is_stdin_not_pattern() {
        let opts = parse_args_raw(["-e", "foo", "-"]).unwrap();
        assert_eq!(opts.infiles, vec!["-"]);
    }

    #[test]
    fn no_group_separator_clears_it() {
        let opts = parse_args_raw(["--no-group-separator"]).unwrap();
        assert_eq!(opts.group_separator, None);
        let opts = parse_args_raw(["--group-separator==="]).unwrap();
        assert_eq!(opts.group_separator.as_deref(), Some("=="));
    }

    #[test]
    fn quiet_has_silent_alias() {
        assert!(parse_args_raw(["--silent"]).unwrap().quiet);
    }

    #[test]
    fn invalid_action_is_rejected() {
        assert!(parse_args_raw(["--devices=maybe"]).is_err());
        assert!(parse_args_raw(["--directories=up"]).is_err());
        assert!(parse_args_raw(["--binary-files=garbage"]).is_err());
        assert!(parse_args_raw(["--encoding=KOI8-R"]).is_err());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(parse_args_raw(["--frobnicate"]).is_err());
        assert!(parse_args_raw(["-%"]).is_err());
    }

    #[test]
    fn perl_clears_basic() {
        let opts = parse_args_raw(["-G", "-P"]).unwrap();
        assert!(opts.perl_regexp);
        assert!(!opts.basic_regexp);
    }
}
