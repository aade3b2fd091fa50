/*!
Крейт unigrep-matcher собирает пользовательские шаблоны в единое регулярное
выражение и прячет за одним фасадом два взаимозаменяемых движка
регулярных выражений.

Движок по умолчанию — конечный автомат из `regex-automata` (линейное время,
осведомлён о Unicode). Опциональный движок — PCRE2 (включается фичей `pcre2`),
который поддерживает Perl-совместимые конструкции ценой возможного
бэктрекинга. Выбор движка делается ровно один раз после компиляции шаблона,
дальше обе ветви отвечают на одни и те же вопросы: «есть ли совпадение,
начиная с данной позиции?» и «есть ли совпадение вообще?».
*/

use regex_automata::{meta, util::syntax, Input};

pub use crate::{
    magic::MagicMatcher,
    pattern::{PatternAssembler, PatternSpec},
};

mod magic;
mod pattern;
#[cfg(feature = "pcre2")]
mod pcre;

/// Диапазон байтов совпадения внутри просматриваемого буфера.
///
/// Смещения всегда указывают в тот буфер, который был передан в `find_at`,
/// и не переживают его.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Span {
    /// Смещение первого байта совпадения.
    pub start: usize,
    /// Смещение сразу за последним байтом совпадения.
    pub end: usize,
}

impl Span {
    /// Возвращает true, когда совпадение имеет нулевую ширину.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Длина совпадения в байтах.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Ошибка, которая может возникнуть при сборке или компиляции шаблона.
#[derive(Debug)]
pub enum Error {
    /// Итоговое регулярное выражение пусто, и файлы шаблонов не заданы.
    Empty,
    /// Недопустимый размер табуляции (допустимы 1, 2, 4 и 8).
    TabSize(u64),
    /// Файл шаблонов не удалось прочитать.
    File(std::path::PathBuf, std::io::Error),
    /// Движок отверг регулярное выражение; строка — его диагностика.
    Syntax(String),
    /// Запрошен движок Perl, но эта сборка скомпилирована без PCRE2.
    PerlUnavailable,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Error::Empty => {
                write!(f, "не задан ни один шаблон и ни один файл шаблонов")
            }
            Error::TabSize(n) => write!(
                f,
                "недопустимый размер табуляции {n}, допустимы 1, 2, 4 и 8",
            ),
            Error::File(ref path, ref err) => {
                write!(f, "не удалось прочитать {}: {err}", path.display())
            }
            Error::Syntax(ref msg) => write!(f, "{msg}"),
            Error::PerlUnavailable => write!(
                f,
                "опция -P недоступна в этой сборке (фича 'pcre2' выключена)",
            ),
        }
    }
}

/// Матчер шаблонов: единый потоковый интерфейс над двумя движками.
#[derive(Debug)]
pub enum PatternMatcher {
    /// Конечный автомат из regex-automata, движок по умолчанию.
    Automata(AutomataMatcher),
    /// Бэктрекающий движок PCRE2 для Perl-совместимых шаблонов.
    #[cfg(feature = "pcre2")]
    Pcre2(crate::pcre::PcreMatcher),
}

impl PatternMatcher {
    /// Скомпилировать собранный шаблон выбранным движком.
    ///
    /// Возвращает ошибку, если движок отверг регулярное выражение, или
    /// если запрошен Perl-движок в сборке без PCRE2.
    pub fn new(spec: &PatternSpec) -> Result<PatternMatcher, Error> {
        if spec.is_perl() {
            #[cfg(feature = "pcre2")]
            {
                return Ok(PatternMatcher::Pcre2(
                    crate::pcre::PcreMatcher::new(spec)?,
                ));
            }
            #[cfg(not(feature = "pcre2"))]
            {
                return Err(Error::PerlUnavailable);
            }
        }
        Ok(PatternMatcher::Automata(AutomataMatcher::new(spec)?))
    }

    /// Найти следующее совпадение в `haystack`, начиная с позиции `at`.
    ///
    /// Совпадения нулевой ширины пропускаются, если только шаблон не
    /// разрешает их явно (опция -Y или альтернатива `^$`). Пропуск
    /// продвигает позицию на один байт, поэтому поиск всегда завершается.
    pub fn find_at(
        &self,
        haystack: &[u8],
        at: usize,
    ) -> Result<Option<Span>, Error> {
        let mut pos = at;
        loop {
            let found = match *self {
                PatternMatcher::Automata(ref m) => m.find_at(haystack, pos),
                #[cfg(feature = "pcre2")]
                PatternMatcher::Pcre2(ref m) => m.find_at(haystack, pos)?,
            };
            match found {
                None => return Ok(None),
                Some(span) if span.is_empty() && !self.empty_allowed() => {
                    if span.end >= haystack.len() {
                        return Ok(None);
                    }
                    pos = span.end + 1;
                }
                Some(span) => return Ok(Some(span)),
            }
        }
    }

    /// Проверить, есть ли хотя бы одно совпадение во всём буфере.
    pub fn is_match(&self, haystack: &[u8]) -> Result<bool, Error> {
        Ok(self.find_at(haystack, 0)?.is_some())
    }

    /// Разрешены ли совпадения нулевой ширины.
    pub fn empty_allowed(&self) -> bool {
        match *self {
            PatternMatcher::Automata(ref m) => m.empty_allowed,
            #[cfg(feature = "pcre2")]
            PatternMatcher::Pcre2(ref m) => m.empty_allowed(),
        }
    }
}

/// Движок по умолчанию: мета-регекс из regex-automata поверх байтов.
///
/// Синтаксис настраивается так, чтобы поиск шёл по произвольным байтам
/// (в том числе невалидному UTF-8), а классы оставались Unicode-классами,
/// пока пользователь не попросил «двоичный» режим опцией -U.
#[derive(Debug)]
pub struct AutomataMatcher {
    re: meta::Regex,
    empty_allowed: bool,
}

impl AutomataMatcher {
    fn new(spec: &PatternSpec) -> Result<AutomataMatcher, Error> {
        let re = meta::Regex::builder()
            .syntax(
                syntax::Config::new()
                    .utf8(false)
                    .unicode(spec.unicode()),
            )
            .configure(meta::Regex::config().utf8_empty(false))
            .build(spec.source())
            .map_err(|err| Error::Syntax(err.to_string()))?;
        Ok(AutomataMatcher { re, empty_allowed: spec.empty_allowed() })
    }

    fn find_at(&self, haystack: &[u8], at: usize) -> Option<Span> {
        self.re
            .find(Input::new(haystack).range(at..))
            .map(|m| Span { start: m.start(), end: m.end() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(pattern: &str) -> PatternMatcher {
        let spec = PatternAssembler::new()
            .pattern(pattern)
            .assemble()
            .unwrap();
        PatternMatcher::new(&spec).unwrap()
    }

    #[test]
    fn finds_in_order() {
        let m = matcher("fo+");
        let hay = b"foo bar fooo";
        let first = m.find_at(hay, 0).unwrap().unwrap();
        assert_eq!((first.start, first.end), (0, 3));
        let second = m.find_at(hay, first.end).unwrap().unwrap();
        assert_eq!((second.start, second.end), (8, 12));
        assert_eq!(m.find_at(hay, second.end).unwrap(), None);
    }

    #[test]
    fn empty_matches_are_skipped_by_default() {
        let m = matcher("x*");
        // Шаблон допускает пустое совпадение в каждой позиции, но фасад
        // обязан выдать только непустое.
        let hay = b"aaxa";
        let found = m.find_at(hay, 0).unwrap().unwrap();
        assert_eq!((found.start, found.end), (2, 3));
    }

    #[test]
    fn empty_line_alternative_enables_empty_matches() {
        let spec = PatternAssembler::new()
            .pattern("^$")
            .assemble()
            .unwrap();
        let m = PatternMatcher::new(&spec).unwrap();
        assert!(m.empty_allowed());
        let hay = b"a\n\nb\n";
        let found = m.find_at(hay, 1).unwrap().unwrap();
        assert_eq!((found.start, found.end), (2, 2));
    }

    #[test]
    fn invalid_utf8_haystack_is_searchable() {
        let m = matcher("world");
        let hay = b"hello\x00\xffworld\n";
        let found = m.find_at(hay, 0).unwrap().unwrap();
        assert_eq!(&hay[found.start..found.end], b"world");
    }

    #[test]
    fn unicode_case_folding() {
        let spec = PatternAssembler::new()
            .pattern("страница")
            .ignore_case(true)
            .assemble()
            .unwrap();
        let m = PatternMatcher::new(&spec).unwrap();
        assert!(m.is_match("СТРАНИЦА".as_bytes()).unwrap());
    }
}
