/*!
Сборка всех источников шаблонов в одно регулярное выражение.

Пользователь может задать шаблоны через -e, позиционным аргументом и
файлами -f, попросить буквальное сопоставление (-F), базовый (-G) или
Perl-синтаксис (-P), привязку к словам (-w) или строкам (-x), сворачивание
регистра (-i/-j) и свободный формат (--free-space). Всё это сводится здесь
к одной строке регулярного выражения с префиксом встроенных флагов
`(?m[i][x])`, которую затем компилирует выбранный движок.
*/

use std::{
    io::{self, BufRead},
    path::{Path, PathBuf},
};

use crate::Error;

/// Собранный шаблон: итоговое регулярное выражение плюс набор флагов
/// компиляции. Создаётся один раз и потребляется компиляцией движка.
#[derive(Clone, Debug)]
pub struct PatternSpec {
    source: String,
    is_perl: bool,
    unicode: bool,
    ignore_case: bool,
    free_space: bool,
    empty_allowed: bool,
    only_matching: bool,
    tab_size: u64,
}

impl PatternSpec {
    /// Итоговое регулярное выражение, включая префикс встроенных флагов.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Нужен ли Perl-движок (PCRE2).
    pub fn is_perl(&self) -> bool {
        self.is_perl
    }

    /// Должны ли классы шаблона быть Unicode-классами.
    pub fn unicode(&self) -> bool {
        self.unicode
    }

    /// Свёрнут ли регистр (после учёта -i и умного регистра -j).
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// Включён ли свободный формат шаблона.
    pub fn free_space(&self) -> bool {
        self.free_space
    }

    /// Разрешены ли совпадения нулевой ширины.
    pub fn empty_allowed(&self) -> bool {
        self.empty_allowed
    }

    /// Включил ли файл шаблонов режим «только совпадения» стражем `###-o`.
    pub fn only_matching(&self) -> bool {
        self.only_matching
    }

    /// Ширина табуляции для вычисления номеров столбцов.
    pub fn tab_size(&self) -> u64 {
        self.tab_size
    }
}

/// Построитель, который сливает все источники шаблонов воедино.
#[derive(Clone, Debug)]
pub struct PatternAssembler {
    patterns: Vec<String>,
    files: Vec<PathBuf>,
    fixed_strings: bool,
    basic_regexp: bool,
    perl_regexp: bool,
    word_regexp: bool,
    line_regexp: bool,
    ignore_case: bool,
    smart_case: bool,
    free_space: bool,
    unicode: bool,
    empty_allowed: bool,
    tab_size: u64,
}

impl Default for PatternAssembler {
    fn default() -> PatternAssembler {
        PatternAssembler::new()
    }
}

impl PatternAssembler {
    /// Создать построитель с настройками по умолчанию: расширенный
    /// синтаксис, Unicode включён, табуляция из восьми столбцов.
    pub fn new() -> PatternAssembler {
        PatternAssembler {
            patterns: vec![],
            files: vec![],
            fixed_strings: false,
            basic_regexp: false,
            perl_regexp: false,
            word_regexp: false,
            line_regexp: false,
            ignore_case: false,
            smart_case: false,
            free_space: false,
            unicode: true,
            empty_allowed: false,
            tab_size: 8,
        }
    }

    /// Добавить шаблон -e. Порядок добавления сохраняется.
    pub fn pattern(&mut self, pattern: &str) -> &mut PatternAssembler {
        self.patterns.push(pattern.to_string());
        self
    }

    /// Добавить файл шаблонов -f. `-` означает стандартный ввод.
    pub fn file<P: AsRef<Path>>(&mut self, path: P) -> &mut PatternAssembler {
        self.files.push(path.as_ref().to_path_buf());
        self
    }

    /// -F: трактовать шаблоны как буквальные строки.
    pub fn fixed_strings(&mut self, yes: bool) -> &mut PatternAssembler {
        self.fixed_strings = yes;
        self
    }

    /// -G: шаблоны заданы в базовом синтаксисе (BRE).
    pub fn basic_regexp(&mut self, yes: bool) -> &mut PatternAssembler {
        self.basic_regexp = yes;
        self
    }

    /// -P: компилировать Perl-движком.
    pub fn perl_regexp(&mut self, yes: bool) -> &mut PatternAssembler {
        self.perl_regexp = yes;
        self
    }

    /// -w: привязать шаблон к границам слова.
    pub fn word_regexp(&mut self, yes: bool) -> &mut PatternAssembler {
        self.word_regexp = yes;
        self
    }

    /// -x: привязать шаблон к целой строке.
    pub fn line_regexp(&mut self, yes: bool) -> &mut PatternAssembler {
        self.line_regexp = yes;
        self
    }

    /// -i: свернуть регистр безусловно.
    pub fn ignore_case(&mut self, yes: bool) -> &mut PatternAssembler {
        self.ignore_case = yes;
        self
    }

    /// -j: свернуть регистр, только если в шаблоне нет заглавных букв ASCII.
    pub fn smart_case(&mut self, yes: bool) -> &mut PatternAssembler {
        self.smart_case = yes;
        self
    }

    /// --free-space: пробелы и переводы строк в шаблоне незначимы.
    pub fn free_space(&mut self, yes: bool) -> &mut PatternAssembler {
        self.free_space = yes;
        self
    }

    /// -U: выключить расширение Unicode, сопоставлять сырые байты.
    pub fn unicode(&mut self, yes: bool) -> &mut PatternAssembler {
        self.unicode = yes;
        self
    }

    /// -Y: разрешить совпадения нулевой ширины.
    pub fn empty_allowed(&mut self, yes: bool) -> &mut PatternAssembler {
        self.empty_allowed = yes;
        self
    }

    /// --tabs: ширина табуляции для номеров столбцов.
    pub fn tab_size(&mut self, size: u64) -> &mut PatternAssembler {
        self.tab_size = size;
        self
    }

    /// Слить все источники в один `PatternSpec`.
    ///
    /// Возвращает ошибку, если не задано ничего для поиска, если файл
    /// шаблонов не читается или если размер табуляции недопустим.
    pub fn assemble(&self) -> Result<PatternSpec, Error> {
        if self.patterns.is_empty() && self.files.is_empty() {
            return Err(Error::Empty);
        }
        if !matches!(self.tab_size, 1 | 2 | 4 | 8) {
            return Err(Error::TabSize(self.tab_size));
        }

        let mut regex = String::new();
        let mut empty_allowed = self.empty_allowed;
        let mut only_matching = false;

        // Шаблоны -e: каждый режется по переводам строк, фрагменты
        // склеиваются через `|`. Пустой шаблон означает «всё подряд».
        for pattern in self.patterns.iter() {
            if pattern.is_empty() {
                push_alternative(&mut regex, ".*\\n?");
                continue;
            }
            for fragment in pattern.split('\n') {
                let fragment =
                    fragment.strip_suffix('\r').unwrap_or(fragment);
                if fragment.is_empty() {
                    continue;
                }
                if fragment == "^$" {
                    // Пользователь явно ищет пустые строки.
                    empty_allowed = true;
                }
                push_alternative(&mut regex, &self.translate(fragment));
            }
        }

        // -x и -w оборачивают только шаблоны -e, но не содержимое -f.
        if !regex.is_empty() {
            if self.line_regexp {
                regex = format!("^({regex})$");
            } else if self.word_regexp {
                regex = format!("\\<({regex})\\>");
            }
        }

        for path in self.files.iter() {
            let rdr = open_pattern_file(path)?;
            self.append_file_patterns(
                rdr,
                &mut regex,
                &mut only_matching,
            )
            .map_err(|err| Error::File(path.clone(), err))?;
        }

        if regex.is_empty() {
            return Err(Error::Empty);
        }

        // -j: сворачиваем регистр, только если во всём выражении нет
        // заглавной буквы ASCII; экранированные символы не считаются.
        let mut ignore_case = self.ignore_case;
        if self.smart_case && !has_uppercase(&regex) {
            ignore_case = true;
        }

        // Префикс встроенных флагов: многострочный режим всегда включён,
        // чтобы ^ и $ привязывались к строкам, а не к началу буфера.
        let mut prefix = String::from("(?m");
        if ignore_case {
            prefix.push('i');
        }
        if self.free_space {
            prefix.push('x');
        }
        prefix.push(')');
        regex.insert_str(0, &prefix);
        log::debug!("собранное регулярное выражение: {regex:?}");

        Ok(PatternSpec {
            source: regex,
            is_perl: self.perl_regexp,
            unicode: self.unicode,
            ignore_case,
            free_space: self.free_space,
            empty_allowed,
            only_matching,
            tab_size: self.tab_size,
        })
    }

    /// Перевести один фрагмент в расширенный синтаксис: экранировать
    /// буквальные строки под -F и переписать базовый синтаксис под -G.
    fn translate(&self, fragment: &str) -> String {
        if self.fixed_strings {
            regex_syntax::escape(fragment)
        } else if self.basic_regexp {
            basic_to_extended(fragment)
        } else {
            fragment.to_string()
        }
    }

    /// Дочитать строки файла шаблонов в регулярное выражение.
    ///
    /// Строки обрезаются от пробелов по краям, пустые пропускаются.
    /// Страж `###-o` в первой строке включает режим «только совпадения».
    fn append_file_patterns<R: BufRead>(
        &self,
        rdr: R,
        regex: &mut String,
        only_matching: &mut bool,
    ) -> io::Result<()> {
        for (lineno, line) in rdr.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if lineno == 0 && line == "###-o" {
                *only_matching = true;
                continue;
            }
            let line = if self.basic_regexp {
                basic_to_extended(line)
            } else {
                line.to_string()
            };
            push_alternative(regex, &line);
        }
        Ok(())
    }
}

/// Дописать альтернативу к растущему регулярному выражению.
fn push_alternative(regex: &mut String, alt: &str) {
    if !regex.is_empty() {
        regex.push('|');
    }
    regex.push_str(alt);
}

/// Открыть файл шаблонов: сначала путь как задан, затем через каталог из
/// переменной окружения GREP_PATH. `-` означает стандартный ввод.
fn open_pattern_file(
    path: &Path,
) -> Result<Box<dyn BufRead>, Error> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::BufReader::new(io::stdin())));
    }
    match std::fs::File::open(path) {
        Ok(file) => return Ok(Box::new(io::BufReader::new(file))),
        Err(err) => {
            if let Some(dir) = std::env::var_os("GREP_PATH") {
                let fallback = PathBuf::from(dir).join(path);
                if let Ok(file) = std::fs::File::open(&fallback) {
                    return Ok(Box::new(io::BufReader::new(file)));
                }
            }
            Err(Error::File(path.to_path_buf(), err))
        }
    }
}

/// Есть ли в выражении незаэкранированная заглавная буква ASCII.
fn has_uppercase(regex: &str) -> bool {
    let bytes = regex.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
        } else {
            if bytes[i].is_ascii_uppercase() {
                return true;
            }
            i += 1;
        }
    }
    false
}

/// Переписать базовый синтаксис (BRE) в расширенный (ERE).
///
/// В базовом синтаксисе группировка, повторители и альтернация пишутся с
/// обратной косой чертой, а их «голые» варианты — буквальные символы.
/// Перестановка экранирования делает из одного другое; `^`, `$`, `*`,
/// классы символов и остальные escape-последовательности не трогаем.
fn basic_to_extended(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(meta @ ('(' | ')' | '{' | '}' | '|' | '+' | '?')) => {
                    out.push(meta)
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '(' | ')' | '{' | '}' | '|' | '+' | '?' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_joined_in_order() {
        let spec = PatternAssembler::new()
            .pattern("foo")
            .pattern("bar")
            .assemble()
            .unwrap();
        assert_eq!(spec.source(), "(?m)foo|bar");
    }

    #[test]
    fn newlines_split_into_alternatives() {
        let spec = PatternAssembler::new()
            .pattern("foo\nbar\r\nbaz")
            .assemble()
            .unwrap();
        assert_eq!(spec.source(), "(?m)foo|bar|baz");
    }

    #[test]
    fn empty_pattern_matches_everything() {
        let spec =
            PatternAssembler::new().pattern("").assemble().unwrap();
        assert_eq!(spec.source(), "(?m).*\\n?");
    }

    #[test]
    fn fixed_strings_are_escaped() {
        let spec = PatternAssembler::new()
            .pattern("a.b+c")
            .fixed_strings(true)
            .assemble()
            .unwrap();
        assert_eq!(spec.source(), r"(?m)a\.b\+c");
    }

    #[test]
    fn line_regexp_wraps_whole_pattern() {
        let spec = PatternAssembler::new()
            .pattern("foo")
            .pattern("bar")
            .line_regexp(true)
            .assemble()
            .unwrap();
        assert_eq!(spec.source(), "(?m)^(foo|bar)$");
    }

    #[test]
    fn word_regexp_wraps_whole_pattern() {
        let spec = PatternAssembler::new()
            .pattern("foo")
            .word_regexp(true)
            .assemble()
            .unwrap();
        assert_eq!(spec.source(), r"(?m)\<(foo)\>");
    }

    #[test]
    fn empty_line_fragment_permits_empty_matches() {
        let spec = PatternAssembler::new()
            .pattern("foo\n^$")
            .assemble()
            .unwrap();
        assert!(spec.empty_allowed());
    }

    #[test]
    fn smart_case_folds_lowercase_pattern() {
        let spec = PatternAssembler::new()
            .pattern("foo")
            .smart_case(true)
            .assemble()
            .unwrap();
        assert!(spec.ignore_case());
        assert_eq!(spec.source(), "(?mi)foo");
    }

    #[test]
    fn smart_case_respects_uppercase() {
        let spec = PatternAssembler::new()
            .pattern("Foo")
            .smart_case(true)
            .assemble()
            .unwrap();
        assert!(!spec.ignore_case());
    }

    #[test]
    fn smart_case_ignores_escaped_uppercase() {
        let spec = PatternAssembler::new()
            .pattern(r"\Wfoo")
            .smart_case(true)
            .assemble()
            .unwrap();
        assert!(spec.ignore_case());
    }

    #[test]
    fn free_space_adds_inline_flag() {
        let spec = PatternAssembler::new()
            .pattern("f o o")
            .free_space(true)
            .assemble()
            .unwrap();
        assert_eq!(spec.source(), "(?mx)f o o");
    }

    #[test]
    fn basic_regexp_is_rewritten() {
        assert_eq!(basic_to_extended(r"\(ab\)\{2\}"), "(ab){2}");
        assert_eq!(basic_to_extended("a(b)c"), r"a\(b\)c");
        assert_eq!(basic_to_extended(r"x\|y"), "x|y");
        assert_eq!(basic_to_extended("a+b?"), r"a\+b\?");
        assert_eq!(basic_to_extended(r"^a.*\<b$"), r"^a.*\<b$");
    }

    #[test]
    fn no_pattern_is_an_error() {
        assert!(matches!(
            PatternAssembler::new().assemble(),
            Err(Error::Empty)
        ));
    }

    #[test]
    fn invalid_tab_size_is_an_error() {
        assert!(matches!(
            PatternAssembler::new().pattern("x").tab_size(3).assemble(),
            Err(Error::TabSize(3))
        ));
    }

    #[test]
    fn file_patterns_are_appended() {
        let rdr = io::Cursor::new("  foo  \n\nbar\n");
        let mut regex = String::from("base");
        let mut only = false;
        PatternAssembler::new()
            .append_file_patterns(rdr, &mut regex, &mut only)
            .unwrap();
        assert_eq!(regex, "base|foo|bar");
        assert!(!only);
    }

    #[test]
    fn file_sentinel_enables_only_matching() {
        let rdr = io::Cursor::new("###-o\nfoo\n");
        let mut regex = String::new();
        let mut only = false;
        PatternAssembler::new()
            .append_file_patterns(rdr, &mut regex, &mut only)
            .unwrap();
        assert_eq!(regex, "foo");
        assert!(only);
    }
}
