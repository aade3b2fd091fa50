/*!
Фильтры кандидатов на поиск: glob-списки включения и исключения с
gitignore-переопределениями и решение «искать ли этот файл».

Каждый список шаблонов идёт в паре со списком переопределений:
`!`-шаблон возвращает в рассмотрение то, что обычные шаблоны отсекли
(или наоборот, выводит из включения). Glob с `/` внутри сопоставляется
с полным путём, без — только с именем файла.
*/

use std::{
    ffi::OsStr,
    path::Path,
};

use unigrep_matcher::MagicMatcher;

use crate::flags::Options;

/// Упорядоченный список glob-шаблонов.
#[derive(Debug, Default)]
pub(crate) struct GlobList {
    globs: Vec<CompiledGlob>,
}

#[derive(Debug)]
struct CompiledGlob {
    matcher: globset::GlobMatcher,
    /// Шаблон содержит `/` и сопоставляется с полным путём.
    full_path: bool,
}

impl GlobList {
    /// Скомпилировать список шаблонов. Шаблоны с `/` получают
    /// буквальный разделитель: `*` в них не пересекает границы
    /// каталогов.
    pub(crate) fn new(patterns: &[String]) -> anyhow::Result<GlobList> {
        let mut globs = vec![];
        for pattern in patterns.iter() {
            let full_path = pattern.contains('/');
            let glob = globset::GlobBuilder::new(pattern)
                .literal_separator(full_path)
                .build()
                .map_err(|err| {
                    anyhow::anyhow!("недопустимый glob '{pattern}': {err}")
                })?;
            globs.push(CompiledGlob {
                matcher: glob.compile_matcher(),
                full_path,
            });
        }
        Ok(GlobList { globs })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    /// Совпадает ли запись хотя бы с одним шаблоном списка.
    pub(crate) fn is_match(&self, path: &Path, basename: &OsStr) -> bool {
        self.globs.iter().any(|glob| {
            if glob.full_path {
                glob.matcher.is_match(path)
            } else {
                glob.matcher.is_match(Path::new(basename))
            }
        })
    }
}

/// Решение фильтров по одному файлу.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FileDecision {
    /// Искать в файле.
    Search,
    /// Пропустить файл.
    Skip,
    /// Нужна проверка магических байтов: попадание ищет файл в обход
    /// списков включения, промах отдаёт решение им.
    CheckMagic,
}

/// Все фильтры обхода, скомпилированные один раз.
#[derive(Debug)]
pub(crate) struct Filters {
    exclude: GlobList,
    exclude_override: GlobList,
    include: GlobList,
    include_override: GlobList,
    exclude_dir: GlobList,
    exclude_override_dir: GlobList,
    include_dir: GlobList,
    include_override_dir: GlobList,
    magic: MagicMatcher,
}

impl Filters {
    /// Собрать фильтры из опций.
    pub(crate) fn from_options(opts: &Options) -> anyhow::Result<Filters> {
        let magic = MagicMatcher::new(&opts.file_magic).map_err(|err| {
            anyhow::anyhow!("опция -M MAGIC: {err}")
        })?;
        Ok(Filters {
            exclude: GlobList::new(&opts.exclude)?,
            exclude_override: GlobList::new(&opts.exclude_override)?,
            include: GlobList::new(&opts.include)?,
            include_override: GlobList::new(&opts.include_override)?,
            exclude_dir: GlobList::new(&opts.exclude_dir)?,
            exclude_override_dir: GlobList::new(&opts.exclude_override_dir)?,
            include_dir: GlobList::new(&opts.include_dir)?,
            include_override_dir: GlobList::new(&opts.include_override_dir)?,
            magic,
        })
    }

    /// Матчер магических байтов.
    pub(crate) fn magic(&self) -> &MagicMatcher {
        &self.magic
    }

    /// Пропускать ли файл, не прошедший проверку магии, не глядя на
    /// списки включения.
    pub(crate) fn magic_miss_skips(&self) -> bool {
        self.include.is_empty()
    }

    /// Спускаться ли в каталог.
    pub(crate) fn dir_selected(&self, path: &Path, basename: &OsStr) -> bool {
        let negated = self.exclude_override_dir.is_match(path, basename);
        if !negated && self.exclude_dir.is_match(path, basename) {
            return false;
        }
        if !self.include_dir.is_empty() {
            if self.include_override_dir.is_match(path, basename) {
                return false;
            }
            if !self.include_dir.is_match(path, basename) {
                return false;
            }
        }
        true
    }

    /// Первая ступень решения по файлу: исключения, затем магия или
    /// сразу списки включения.
    pub(crate) fn file_decision(
        &self,
        path: &Path,
        basename: &OsStr,
    ) -> FileDecision {
        let negated = self.exclude_override.is_match(path, basename);
        if !negated && self.exclude.is_match(path, basename) {
            return FileDecision::Skip;
        }
        if self.magic.is_enabled() {
            return FileDecision::CheckMagic;
        }
        self.include_decision(path, basename)
    }

    /// Решение по спискам включения.
    pub(crate) fn include_decision(
        &self,
        path: &Path,
        basename: &OsStr,
    ) -> FileDecision {
        if self.include.is_empty() {
            return FileDecision::Search;
        }
        if self.include_override.is_match(path, basename) {
            return FileDecision::Skip;
        }
        if self.include.is_match(path, basename) {
            FileDecision::Search
        } else {
            FileDecision::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(tweak: impl FnOnce(&mut Options)) -> Filters {
        let mut opts = Options::default();
        tweak(&mut opts);
        Filters::from_options(&opts).unwrap()
    }

    fn decide(filters: &Filters, path: &str) -> FileDecision {
        let path = Path::new(path);
        let basename = path.file_name().unwrap();
        filters.file_decision(path, basename)
    }

    #[test]
    fn no_filters_searches_everything() {
        let f = filters(|_| {});
        assert_eq!(decide(&f, "src/main.rs"), FileDecision::Search);
    }

    #[test]
    fn exclude_by_basename() {
        let f = filters(|o| o.exclude = vec!["*.log".to_string()]);
        assert_eq!(decide(&f, "var/app.log"), FileDecision::Skip);
        assert_eq!(decide(&f, "var/app.txt"), FileDecision::Search);
    }

    #[test]
    fn exclude_override_readmits() {
        let f = filters(|o| {
            o.exclude = vec!["*.log".to_string()];
            o.exclude_override = vec!["keep.log".to_string()];
        });
        assert_eq!(decide(&f, "var/app.log"), FileDecision::Skip);
        assert_eq!(decide(&f, "var/keep.log"), FileDecision::Search);
    }

    #[test]
    fn include_restricts() {
        let f = filters(|o| o.include = vec!["*.rs".to_string()]);
        assert_eq!(decide(&f, "src/main.rs"), FileDecision::Search);
        assert_eq!(decide(&f, "README.md"), FileDecision::Skip);
    }

    #[test]
    fn include_override_excludes_back() {
        let f = filters(|o| {
            o.include = vec!["*.rs".to_string()];
            o.include_override = vec!["build.rs".to_string()];
        });
        assert_eq!(decide(&f, "src/main.rs"), FileDecision::Search);
        assert_eq!(decide(&f, "build.rs"), FileDecision::Skip);
    }

    #[test]
    fn slash_means_full_path() {
        let f = filters(|o| o.exclude = vec!["target/*".to_string()]);
        assert_eq!(decide(&f, "target/debug"), FileDecision::Skip);
        // `*` при буквальном разделителе не пересекает `/`.
        assert_eq!(decide(&f, "target/debug/app"), FileDecision::Search);
        // Без `/` в шаблоне сопоставляется только имя файла.
        let f = filters(|o| o.exclude = vec!["debug".to_string()]);
        assert_eq!(decide(&f, "target/debug"), FileDecision::Skip);
    }

    #[test]
    fn magic_takes_priority_over_include() {
        let f = filters(|o| {
            o.include = vec!["*.py".to_string()];
            o.file_magic = vec!["#!/bin/sh\\n".to_string()];
        });
        assert_eq!(decide(&f, "script"), FileDecision::CheckMagic);
        assert!(!f.magic_miss_skips());
    }

    #[test]
    fn dir_filters_with_overrides() {
        let f = filters(|o| {
            o.exclude_dir = vec!["target".to_string()];
            o.exclude_override_dir = vec!["target-keep".to_string()];
            o.include_dir = vec![];
        });
        assert!(!f.dir_selected(Path::new("target"), OsStr::new("target")));
        assert!(f.dir_selected(
            Path::new("target-keep"),
            OsStr::new("target-keep")
        ));
        assert!(f.dir_selected(Path::new("src"), OsStr::new("src")));
    }
}
