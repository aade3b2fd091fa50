/*!
Плоская запись всех опций командной строки.

Запись заполняется парсером, один раз нормализуется ([`Options::finalize`])
и дальше читается всеми подсистемами. Нормализация повторяет взаимные
влияния флагов: -y отключает контекст, контекст отключает -o, -v
отключает -g и -o, -q подразумевает -s и --max-files=1, и так далее.
*/

use std::{
    ffi::OsString,
    io::BufRead,
    path::{Path, PathBuf},
};

use anyhow::Context;

use unigrep_matcher::PatternAssembler;
use unigrep_printer::{ColorPalette, PrinterConfig};
use unigrep_searcher::Encoding;

/// Что делать с каталогом в аргументах.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum DirectoryAction {
    /// Предупредить, что это каталог, и пропустить.
    #[default]
    Read,
    /// Рекурсивно обойти.
    Recurse,
    /// Рекурсивно обойти, следуя символьным ссылкам.
    DereferenceRecurse,
    /// Молча пропустить.
    Skip,
}

/// Что делать с устройствами, каналами и сокетами.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum DeviceAction {
    #[default]
    Read,
    Skip,
}

/// Политика вывода для двоичных файлов (--binary-files).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum BinaryFiles {
    /// Сообщить о совпадении, не показывая его.
    #[default]
    Binary,
    /// Игнорировать совпадения в двоичных файлах (-I).
    WithoutMatch,
    /// Считать любой файл текстом (-a).
    Text,
    /// Показывать каждое совпадение шестнадцатерично (-X).
    Hex,
    /// Шестнадцатерично только двоичные совпадения (-W).
    WithHex,
}

/// Значение --color.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ColorWhen {
    Never,
    Auto,
    Always,
}

/// Уровень диагностики (--debug / --trace).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LoggingMode {
    Debug,
    Trace,
}

/// Все флаги одним плоским набором. Имена повторяют длинные опции.
#[derive(Clone, Debug)]
pub(crate) struct Options {
    pub with_filename: bool,
    pub no_filename: bool,
    pub no_group: bool,
    pub no_messages: bool,
    pub no_hidden: bool,
    pub count: bool,
    pub fixed_strings: bool,
    pub free_space: bool,
    pub ignore_case: bool,
    pub smart_case: bool,
    pub invert_match: bool,
    pub only_line_number: bool,
    pub line_number: bool,
    pub column_number: bool,
    pub byte_offset: bool,
    pub line_buffered: bool,
    pub only_matching: bool,
    pub quiet: bool,
    pub files_with_match: bool,
    pub files_without_match: bool,
    pub null: bool,
    pub basic_regexp: bool,
    pub perl_regexp: bool,
    pub word_regexp: bool,
    pub line_regexp: bool,
    pub dereference: bool,
    pub no_dereference: bool,
    /// -U: сопоставлять сырые байты, без расширения Unicode.
    pub no_unicode: bool,
    /// -Y: разрешить пустые совпадения.
    pub empty: bool,
    pub initial_tab: bool,
    pub decompress: bool,
    /// -y: выводить каждую строку, несовпавшие — как контекст.
    pub any_line: bool,
    pub break_output: bool,
    pub stats: bool,
    pub after_context: u64,
    pub before_context: u64,
    pub max_count: u64,
    pub max_depth: u64,
    pub max_files: u64,
    /// -J: принимается и игнорируется, поиск последовательный.
    pub jobs: u64,
    pub tabs: u64,
    pub pager: Option<String>,
    pub color: Option<ColorWhen>,
    /// Итог разрешения --color против терминала и TERM.
    pub color_enabled: bool,
    pub encoding: Encoding,
    pub devices: DeviceAction,
    pub directories: DirectoryAction,
    pub label: String,
    pub separator: String,
    pub group_separator: Option<String>,
    pub binary_files: BinaryFiles,
    pub regexp: Vec<String>,
    pub file: Vec<PathBuf>,
    pub file_type: Vec<String>,
    pub file_extensions: Vec<String>,
    pub file_magic: Vec<String>,
    pub include: Vec<String>,
    pub include_dir: Vec<String>,
    pub include_from: Vec<String>,
    pub include_override: Vec<String>,
    pub include_override_dir: Vec<String>,
    pub exclude: Vec<String>,
    pub exclude_dir: Vec<String>,
    pub exclude_from: Vec<String>,
    pub exclude_override: Vec<String>,
    pub exclude_override_dir: Vec<String>,
    pub infiles: Vec<OsString>,
    pub logging: Option<LoggingMode>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            with_filename: false,
            no_filename: false,
            no_group: false,
            no_messages: false,
            no_hidden: false,
            count: false,
            fixed_strings: false,
            free_space: false,
            ignore_case: false,
            smart_case: false,
            invert_match: false,
            only_line_number: false,
            line_number: false,
            column_number: false,
            byte_offset: false,
            line_buffered: false,
            only_matching: false,
            quiet: false,
            files_with_match: false,
            files_without_match: false,
            null: false,
            basic_regexp: false,
            perl_regexp: false,
            word_regexp: false,
            line_regexp: false,
            dereference: false,
            no_dereference: false,
            no_unicode: false,
            empty: false,
            initial_tab: false,
            decompress: false,
            any_line: false,
            break_output: false,
            stats: false,
            after_context: 0,
            before_context: 0,
            max_count: 0,
            max_depth: 0,
            max_files: 0,
            jobs: 0,
            tabs: 8,
            pager: None,
            color: None,
            color_enabled: false,
            encoding: Encoding::Plain,
            devices: DeviceAction::Read,
            directories: DirectoryAction::Read,
            label: "(standard input)".to_string(),
            separator: ":".to_string(),
            group_separator: Some("--".to_string()),
            binary_files: BinaryFiles::Binary,
            regexp: vec![],
            file: vec![],
            file_type: vec![],
            file_extensions: vec![],
            file_magic: vec![],
            include: vec![],
            include_dir: vec![],
            include_from: vec![],
            include_override: vec![],
            include_override_dir: vec![],
            exclude: vec![],
            exclude_dir: vec![],
            exclude_from: vec![],
            exclude_override: vec![],
            exclude_override_dir: vec![],
            infiles: vec![],
            logging: None,
        }
    }
}

impl Options {
    /// Нормализовать разобранные флаги: развернуть типы файлов,
    /// прочитать файлы glob-шаблонов и применить взаимные влияния
    /// флагов.
    pub(crate) fn finalize(&mut self) -> anyhow::Result<()> {
        // -t: типы добавляют расширения и магические сигнатуры.
        for name in std::mem::take(&mut self.file_type) {
            let ty = crate::flags::types::lookup(&name).with_context(|| {
                format!(
                    "недопустимый --file-type={name}, список типов \
                     покажет -tlist"
                )
            })?;
            self.file_extensions.push(ty.extensions.to_string());
            if let Some(magic) = ty.magic {
                self.file_magic.push(magic.to_string());
            }
        }

        // -O: расширения превращаются в glob-шаблоны включения.
        for extensions in std::mem::take(&mut self.file_extensions) {
            for ext in extensions.split(',') {
                if !ext.is_empty() {
                    self.include.push(format!("*.{ext}"));
                }
            }
        }

        // --exclude-from и --include-from: gitignore-файлы шаблонов.
        for path in std::mem::take(&mut self.exclude_from) {
            let (mut plain, mut dirs, mut over, mut over_dirs) =
                read_glob_file(Path::new(&path))?;
            self.exclude.append(&mut plain);
            self.exclude_dir.append(&mut dirs);
            self.exclude_override.append(&mut over);
            self.exclude_override_dir.append(&mut over_dirs);
        }
        for path in std::mem::take(&mut self.include_from) {
            let (mut plain, mut dirs, mut over, mut over_dirs) =
                read_glob_file(Path::new(&path))?;
            self.include.append(&mut plain);
            self.include_dir.append(&mut dirs);
            self.include_override.append(&mut over);
            self.include_override_dir.append(&mut over_dirs);
        }

        // -y отключает контекст; -y и контекст отключают -o; -v
        // отключает -g и -o.
        if self.any_line {
            self.after_context = 0;
            self.before_context = 0;
        }
        if self.any_line || self.after_context > 0 || self.before_context > 0
        {
            self.only_matching = false;
        }
        if self.invert_match {
            self.no_group = false;
            self.only_matching = false;
        }

        // -q: достаточно одного файла с совпадением, сообщения не нужны.
        if self.quiet {
            self.no_messages = true;
            self.max_files = 1;
        }

        // -J принимается ради совместимости; поиск последовательный,
        // чтобы порядок вывода оставался детерминированным.
        if self.jobs > 0 {
            log::debug!("--jobs={} принят и игнорируется", self.jobs);
        }

        // Нормализация политики символьных ссылок; -p сильнее -S.
        if self.directories == DirectoryAction::DereferenceRecurse {
            self.directories = DirectoryAction::Recurse;
            self.dereference = true;
        }
        if self.no_dereference {
            self.dereference = false;
        }

        // Имя файла показывается при нескольких входах или рекурсии,
        // если его не запретили явно.
        if !self.no_filename
            && (self.infiles.len() > 1
                || self.directories == DirectoryAction::Recurse)
        {
            self.with_filename = true;
        }

        self.color_enabled = match self.color {
            None | Some(ColorWhen::Never) => false,
            Some(ColorWhen::Always) => true,
            Some(ColorWhen::Auto) => {
                let term = std::env::var("TERM").unwrap_or_default();
                let color_term = term.contains("ansi")
                    || term.contains("xterm")
                    || term.contains("color");
                color_term && unigrep_cli::is_tty_stdout()
            }
        };

        // --pager работает только на терминале и подразумевает --break
        // и построчную буферизацию.
        if self.pager.is_some() {
            if unigrep_cli::is_tty_stdout() {
                self.break_output = true;
                self.line_buffered = true;
            } else {
                self.pager = None;
            }
        }

        // Без входов читается стандартный ввод, кроме рекурсивного
        // режима, который начинает с текущего каталога.
        if self.infiles.is_empty()
            && self.directories != DirectoryAction::Recurse
        {
            self.infiles.push(OsString::from("-"));
        }
        Ok(())
    }

    /// Построитель шаблонов, настроенный этими опциями.
    pub(crate) fn pattern_assembler(&self) -> PatternAssembler {
        let mut assembler = PatternAssembler::new();
        for pattern in self.regexp.iter() {
            assembler.pattern(pattern);
        }
        for path in self.file.iter() {
            assembler.file(path);
        }
        assembler
            .fixed_strings(self.fixed_strings)
            .basic_regexp(self.basic_regexp)
            .perl_regexp(self.perl_regexp)
            .word_regexp(self.word_regexp)
            .line_regexp(self.line_regexp)
            .ignore_case(self.ignore_case)
            .smart_case(self.smart_case)
            .free_space(self.free_space)
            .unicode(!self.no_unicode)
            .empty_allowed(self.empty)
            .tab_size(self.tabs);
        assembler
    }

    /// Настройки принтера, снятые с флагов.
    pub(crate) fn printer_config(&self) -> PrinterConfig {
        PrinterConfig {
            with_filename: self.with_filename,
            null: self.null,
            line_number: self.line_number,
            only_line_number: self.only_line_number,
            column_number: self.column_number,
            byte_offset: self.byte_offset,
            hex_offset: self.binary_files == BinaryFiles::Hex,
            initial_tab: self.initial_tab,
            separator: self.separator.clone(),
            group_separator: self.group_separator.clone(),
            line_buffered: self.line_buffered,
        }
    }

    /// Палитра цветов: из окружения, когда цвет включён.
    pub(crate) fn color_palette(&self) -> ColorPalette {
        if !self.color_enabled {
            return ColorPalette::disabled();
        }
        let grep_colors = std::env::var("GREP_COLORS").ok();
        let grep_color = std::env::var("GREP_COLOR").ok();
        ColorPalette::from_env(
            grep_colors.as_deref(),
            grep_color.as_deref(),
            self.invert_match,
        )
    }
}

/// Прочитать gitignore-файл glob-шаблонов.
///
/// Возвращает четыре списка: шаблоны файлов, шаблоны каталогов и их
/// `!`-переопределения. Строка с завершающим `/` относится только к
/// каталогам; прочие строки попадают в оба списка. Пустые строки и
/// комментарии `#` пропускаются, ведущий `\` снимается.
fn read_glob_file(
    path: &Path,
) -> anyhow::Result<(Vec<String>, Vec<String>, Vec<String>, Vec<String>)> {
    let rdr: Box<dyn BufRead> = if path.as_os_str() == "-" {
        Box::new(std::io::BufReader::new(std::io::stdin()))
    } else {
        Box::new(std::io::BufReader::new(
            std::fs::File::open(path).with_context(|| {
                format!("не удалось прочитать {}", path.display())
            })?,
        ))
    };
    let mut plain = vec![];
    let mut dirs = vec![];
    let mut overrides = vec![];
    let mut override_dirs = vec![];
    for line in rdr.lines() {
        let line = line
            .with_context(|| format!("ошибка чтения {}", path.display()))?;
        let mut glob = line.trim();
        if glob.is_empty() || glob.starts_with('#') {
            continue;
        }
        let negated = match glob.strip_prefix('!') {
            Some(rest) => {
                glob = rest;
                true
            }
            None => {
                glob = glob.strip_prefix('\\').unwrap_or(glob);
                false
            }
        };
        let (dir_only, glob) = match glob.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, glob),
        };
        if glob.is_empty() {
            continue;
        }
        let (files, directories) = if negated {
            (&mut overrides, &mut override_dirs)
        } else {
            (&mut plain, &mut dirs)
        };
        if !dir_only {
            files.push(glob.to_string());
        }
        directories.push(glob.to_string());
    }
    Ok((plain, dirs, overrides, override_dirs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_line_disables_context_and_only_matching() {
        let mut opts = Options {
            any_line: true,
            after_context: 3,
            before_context: 2,
            only_matching: true,
            ..Options::default()
        };
        opts.finalize().unwrap();
        assert_eq!(opts.after_context, 0);
        assert_eq!(opts.before_context, 0);
        assert!(!opts.only_matching);
    }

    #[test]
    fn invert_disables_grouping_modes() {
        let mut opts = Options {
            invert_match: true,
            no_group: true,
            only_matching: true,
            ..Options::default()
        };
        opts.finalize().unwrap();
        assert!(!opts.no_group);
        assert!(!opts.only_matching);
    }

    #[test]
    fn quiet_implies_silent_single_file() {
        let mut opts = Options { quiet: true, ..Options::default() };
        opts.finalize().unwrap();
        assert!(opts.no_messages);
        assert_eq!(opts.max_files, 1);
    }

    #[test]
    fn extensions_become_include_globs() {
        let mut opts = Options {
            file_extensions: vec!["rs,toml".to_string()],
            ..Options::default()
        };
        opts.finalize().unwrap();
        assert_eq!(opts.include, vec!["*.rs", "*.toml"]);
    }

    #[test]
    fn file_type_expands_extensions_and_magic() {
        let mut opts = Options {
            file_type: vec!["Python".to_string()],
            ..Options::default()
        };
        opts.finalize().unwrap();
        assert!(opts.include.iter().any(|g| g == "*.py"));
        assert_eq!(opts.file_magic.len(), 1);
    }

    #[test]
    fn recursion_enables_filenames() {
        let mut opts = Options {
            directories: DirectoryAction::Recurse,
            ..Options::default()
        };
        opts.finalize().unwrap();
        assert!(opts.with_filename);
        // Рекурсия не добавляет чтение stdin.
        assert!(opts.infiles.is_empty());
    }

    #[test]
    fn stdin_is_the_default_input() {
        let mut opts = Options::default();
        opts.finalize().unwrap();
        assert_eq!(opts.infiles, vec![std::ffi::OsString::from("-")]);
    }

    #[test]
    fn no_dereference_beats_dereference_recurse() {
        let mut opts = Options {
            directories: DirectoryAction::DereferenceRecurse,
            no_dereference: true,
            ..Options::default()
        };
        opts.finalize().unwrap();
        assert_eq!(opts.directories, DirectoryAction::Recurse);
        assert!(!opts.dereference);
    }
}
