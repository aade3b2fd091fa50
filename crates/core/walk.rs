/*!
Обход аргументов-файлов и каталогов.

Для каждого аргумента решается его судьба по политике каталогов,
устройств и символьных ссылок; рекурсивный спуск делает `walkdir` с
ограничением глубины и защитой от циклов ссылок, а фильтры каталогов
подрезают дерево ещё до спуска. Обход останавливается кооперативно,
когда набрано --max-files файлов с совпадениями.
*/

use std::{
    ffi::OsStr,
    io::{self, Read},
    path::Path,
};

use walkdir::WalkDir;

use crate::{
    flags::{DeviceAction, DirectoryAction, Options},
    haystack::{FileDecision, Filters},
    search::SearchWorker,
};

/// Счётчики одного запуска.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Stats {
    /// Сколько файлов было просмотрено.
    pub files_searched: u64,
    /// Сколько каталогов было посещено.
    pub dirs_visited: u64,
    /// В скольких файлах нашлись совпадения.
    pub files_with_matches: u64,
}

/// Обходчик: связывает опции, фильтры, поисковый движок и счётчики.
pub(crate) struct Walker<'a, W: io::Write> {
    opts: &'a Options,
    filters: &'a Filters,
    worker: &'a mut SearchWorker<W>,
    stats: &'a mut Stats,
    /// Дескриптор потока вывода для защиты от чтения собственного
    /// вывода; None, когда вывод идёт не в файл (например, в пейджер).
    out_handle: Option<same_file::Handle>,
}

impl<'a, W: io::Write> Walker<'a, W> {
    pub(crate) fn new(
        opts: &'a Options,
        filters: &'a Filters,
        worker: &'a mut SearchWorker<W>,
        stats: &'a mut Stats,
        guard_stdout: bool,
    ) -> Walker<'a, W> {
        let out_handle = if guard_stdout {
            same_file::Handle::stdout().ok()
        } else {
            None
        };
        Walker { opts, filters, worker, stats, out_handle }
    }

    /// Достигнут ли предел --max-files.
    pub(crate) fn max_files_reached(&self) -> bool {
        self.opts.max_files > 0
            && self.stats.files_with_matches >= self.opts.max_files
    }

    /// Обработать стандартный ввод.
    pub(crate) fn search_stdin(&mut self) -> io::Result<()> {
        self.stats.files_searched += 1;
        if self.worker.search_stdin()? {
            self.stats.files_with_matches += 1;
        }
        Ok(())
    }

    /// Рекурсия от текущего каталога, когда входы не заданы.
    pub(crate) fn search_cwd(&mut self) -> io::Result<()> {
        self.walk_dir(Path::new("."))
    }

    /// Обработать один аргумент командной строки: файл, каталог или
    /// символьную ссылку.
    pub(crate) fn search_argument(&mut self, arg: &OsStr) -> io::Result<()> {
        let path = Path::new(arg);
        let basename = path.file_name().unwrap_or(path.as_os_str());
        if self.opts.no_hidden && is_hidden(basename) {
            return Ok(());
        }
        let metadata = match path.symlink_metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                err_message!("не удалось открыть {}: {err}", path.display());
                return Ok(());
            }
        };
        let file_type = if metadata.file_type().is_symlink() {
            // Ссылку в аргументах разыменовываем, если не задано -p.
            if self.opts.no_dereference {
                log::debug!(
                    "{}: символьная ссылка пропущена из-за -p",
                    path.display(),
                );
                return Ok(());
            }
            match path.metadata() {
                Ok(metadata) => metadata.file_type(),
                Err(err) => {
                    err_message!(
                        "не удалось открыть {}: {err}",
                        path.display(),
                    );
                    return Ok(());
                }
            }
        } else {
            metadata.file_type()
        };
        if file_type.is_dir() {
            match self.opts.directories {
                DirectoryAction::Read => {
                    message!("{} is a directory", path.display());
                    Ok(())
                }
                DirectoryAction::Skip => Ok(()),
                _ => {
                    // Фильтры каталогов применяются и к явному
                    // аргументу, кроме текущего каталога.
                    if path.as_os_str() != "."
                        && !self.filters.dir_selected(path, basename)
                    {
                        return Ok(());
                    }
                    self.walk_dir(path)
                }
            }
        } else if file_type.is_file()
            || self.opts.devices == DeviceAction::Read
        {
            self.consider_file(path, basename)
        } else {
            Ok(())
        }
    }

    /// Рекурсивный спуск в каталог.
    fn walk_dir(&mut self, root: &Path) -> io::Result<()> {
        let opts = self.opts;
        let filters = self.filters;
        let mut builder = WalkDir::new(root)
            .follow_links(opts.dereference)
            .follow_root_links(!opts.no_dereference);
        if opts.max_depth > 0 {
            builder = builder.max_depth(opts.max_depth as usize);
        }
        let walker = builder
            .into_iter()
            .filter_entry(move |entry| keep_entry(opts, filters, entry));
        for result in walker {
            if self.max_files_reached() {
                break;
            }
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    err_message!("не удалось прочитать каталог: {err}");
                    continue;
                }
            };
            let file_type = entry.file_type();
            if file_type.is_dir() {
                self.stats.dirs_visited += 1;
                continue;
            }
            if file_type.is_symlink() {
                // Без -S и -R ссылки внутри дерева не разыменовываются.
                continue;
            }
            if !file_type.is_file()
                && self.opts.devices == DeviceAction::Skip
            {
                continue;
            }
            let path = clean_path(entry.path());
            let Some(basename) = entry.path().file_name() else {
                continue;
            };
            self.consider_file(path, basename)?;
        }
        Ok(())
    }

    /// Пропустить файл через фильтры и, если он проходит, поискать в
    /// нём.
    fn consider_file(
        &mut self,
        path: &Path,
        basename: &OsStr,
    ) -> io::Result<()> {
        match self.filters.file_decision(path, basename) {
            FileDecision::Skip => Ok(()),
            FileDecision::Search => self.search_file(path),
            FileDecision::CheckMagic => {
                match self.probe_magic(path) {
                    Err(err) => {
                        err_message!(
                            "не удалось прочитать {}: {err}",
                            path.display(),
                        );
                        Ok(())
                    }
                    // Попадание магии ищет файл в обход включений.
                    Ok(true) => self.search_file(path),
                    Ok(false) => {
                        if self.filters.magic_miss_skips() {
                            return Ok(());
                        }
                        match self.filters.include_decision(path, basename) {
                            FileDecision::Search => self.search_file(path),
                            _ => Ok(()),
                        }
                    }
                }
            }
        }
    }

    /// Проверить префикс файла магическим матчером с учётом распаковки
    /// и перекодировки.
    fn probe_magic(&self, path: &Path) -> io::Result<bool> {
        let mut prefix = Vec::with_capacity(4096);
        self.worker
            .open_raw(path)?
            .take(4096)
            .read_to_end(&mut prefix)?;
        Ok(self.filters.magic().scan(&prefix))
    }

    /// Запустить поиск в файле, если это не наш собственный вывод.
    fn search_file(&mut self, path: &Path) -> io::Result<()> {
        if let Some(ref out) = self.out_handle {
            if let Ok(handle) = same_file::Handle::from_path(path) {
                if handle == *out {
                    log::debug!(
                        "{}: пропущен, это поток вывода",
                        path.display(),
                    );
                    return Ok(());
                }
            }
        }
        self.stats.files_searched += 1;
        let label = clean_path(path).display().to_string();
        match self.worker.search_path(path, &label) {
            Ok(true) => {
                self.stats.files_with_matches += 1;
                Ok(())
            }
            Ok(false) => Ok(()),
            // Разрыв канала всплывает наверх и завершает обход.
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Err(err),
            Err(err) => {
                err_message!("{}: {err}", path.display());
                Ok(())
            }
        }
    }
}

/// Начинается ли имя с точки.
pub(crate) fn is_hidden(basename: &OsStr) -> bool {
    basename.as_encoded_bytes().starts_with(b".")
}

/// Снять ведущий `./` с путей, пришедших из рекурсии по текущему
/// каталогу.
fn clean_path(path: &Path) -> &Path {
    match path.strip_prefix(".") {
        Ok(stripped) if !stripped.as_os_str().is_empty() => stripped,
        _ => path,
    }
}

/// Предикат спуска для walkdir: прячет скрытые записи и отфильтрованные
/// каталоги до того, как обход в них зайдёт.
fn keep_entry(
    opts: &Options,
    filters: &Filters,
    entry: &walkdir::DirEntry,
) -> bool {
    if entry.depth() == 0 {
        // Корень уже проверил вызывающий.
        return true;
    }
    let basename = entry.file_name();
    if opts.no_hidden && is_hidden(basename) {
        return false;
    }
    if entry.file_type().is_dir() {
        filters.dir_selected(clean_path(entry.path()), basename)
    } else {
        true
    }
}
