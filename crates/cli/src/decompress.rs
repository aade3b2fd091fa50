/*!
Распаковка сжатых файлов внешними командами.

Вместо привязки к конкретным библиотекам сжатия файл по расширению
сопоставляется с командой (`gzip -d -c` и родственники), а её stdout
читается потоком. Файл без подходящей команды читается как есть.
*/

use std::{
    fs::File,
    io::{self, Read},
    path::Path,
    process::Command,
};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::process::CommandReader;

/// Команда распаковки для одного семейства расширений.
#[derive(Clone, Debug)]
struct DecompressionCommand {
    bin: &'static str,
    args: &'static [&'static str],
}

/// Таблица по умолчанию: glob расширения и команда для него.
const DEFAULT_COMMANDS: &[(&str, DecompressionCommand)] = &[
    ("*.gz", DecompressionCommand { bin: "gzip", args: &["-d", "-c"] }),
    ("*.tgz", DecompressionCommand { bin: "gzip", args: &["-d", "-c"] }),
    ("*.Z", DecompressionCommand { bin: "gzip", args: &["-d", "-c"] }),
    ("*.bz2", DecompressionCommand { bin: "bzip2", args: &["-d", "-c"] }),
    ("*.tbz2", DecompressionCommand { bin: "bzip2", args: &["-d", "-c"] }),
    ("*.xz", DecompressionCommand { bin: "xz", args: &["-d", "-c"] }),
    ("*.txz", DecompressionCommand { bin: "xz", args: &["-d", "-c"] }),
    ("*.lzma", DecompressionCommand { bin: "xz", args: &["-d", "-c"] }),
    ("*.lz4", DecompressionCommand { bin: "lz4", args: &["-d", "-c"] }),
    (
        "*.zst",
        DecompressionCommand { bin: "zstd", args: &["-q", "-d", "-c"] },
    ),
    ("*.br", DecompressionCommand { bin: "brotli", args: &["-d", "-c"] }),
];

/// Сопоставление пути файла с командой распаковки.
#[derive(Clone, Debug)]
pub struct DecompressionMatcher {
    globs: GlobSet,
    commands: Vec<DecompressionCommand>,
}

impl Default for DecompressionMatcher {
    fn default() -> DecompressionMatcher {
        DecompressionMatcher::new()
    }
}

impl DecompressionMatcher {
    /// Матчер с таблицей команд по умолчанию.
    pub fn new() -> DecompressionMatcher {
        let mut builder = GlobSetBuilder::new();
        let mut commands = vec![];
        for (glob, command) in DEFAULT_COMMANDS.iter() {
            // Таблица статична, все glob-шаблоны в ней корректны.
            builder.add(Glob::new(glob).unwrap());
            commands.push(command.clone());
        }
        let globs = builder.build().unwrap();
        DecompressionMatcher { globs, commands }
    }

    /// Есть ли для данного пути команда распаковки.
    pub fn has_command<P: AsRef<Path>>(&self, path: P) -> bool {
        self.globs.is_match(path)
    }

    /// Собрать команду распаковки для данного пути, если она известна.
    pub fn command<P: AsRef<Path>>(&self, path: P) -> Option<Command> {
        let index = self.globs.matches(path).into_iter().next_back()?;
        let decomp = &self.commands[index];
        let mut cmd = Command::new(decomp.bin);
        cmd.args(decomp.args);
        Some(cmd)
    }
}

/// Потоковый читатель распакованного содержимого файла.
///
/// Если для файла нет команды распаковки или её не удалось запустить
/// (например, распаковщик не установлен), файл читается как есть; отказ
/// запуска при этом логируется на уровне отладки.
#[derive(Debug)]
pub struct DecompressionReader {
    rdr: Result<CommandReader, File>,
}

impl DecompressionReader {
    /// Открыть путь с распаковкой по таблице матчера.
    pub fn new(
        path: &Path,
        matcher: &DecompressionMatcher,
    ) -> io::Result<DecompressionReader> {
        let Some(mut cmd) = matcher.command(path) else {
            return DecompressionReader::new_passthru(path);
        };
        cmd.arg(path);
        match CommandReader::new(&mut cmd) {
            Ok(rdr) => Ok(DecompressionReader { rdr: Ok(rdr) }),
            Err(err) => {
                log::debug!(
                    "{}: не удалось запустить распаковщик, читаем как есть: \
                     {err}",
                    path.display(),
                );
                DecompressionReader::new_passthru(path)
            }
        }
    }

    fn new_passthru(path: &Path) -> io::Result<DecompressionReader> {
        Ok(DecompressionReader { rdr: Err(File::open(path)?) })
    }
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.rdr {
            Ok(ref mut rdr) => rdr.read(buf),
            Err(ref mut file) => file.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DecompressionMatcher;

    #[test]
    fn known_extensions_have_commands() {
        let matcher = DecompressionMatcher::new();
        assert!(matcher.has_command("archive.tar.gz"));
        assert!(matcher.has_command("dump.xz"));
        assert!(matcher.has_command("notes.zst"));
        assert!(!matcher.has_command("plain.txt"));
    }

    #[test]
    fn command_includes_flags() {
        let matcher = DecompressionMatcher::new();
        let cmd = matcher.command("a.gz").unwrap();
        assert_eq!(cmd.get_program(), "gzip");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, &["-d", "-c"]);
    }
}
