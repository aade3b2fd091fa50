/*!
Потоковое чтение stdout внешнего процесса.

Stderr процесса читается отдельным потоком в кучу, чтобы шумный процесс
не забил канал и не повис; если процесс завершился с ошибкой, собранный
stderr становится текстом ошибки.
*/

use std::{
    io::{self, Read},
    process,
};

/// Ошибка запуска команды или чтения её вывода.
#[derive(Debug)]
pub struct CommandError {
    kind: CommandErrorKind,
}

#[derive(Debug)]
enum CommandErrorKind {
    Io(io::Error),
    Stderr(Vec<u8>),
}

impl CommandError {
    fn stderr(bytes: Vec<u8>) -> CommandError {
        CommandError { kind: CommandErrorKind::Stderr(bytes) }
    }

    fn is_empty(&self) -> bool {
        match self.kind {
            CommandErrorKind::Stderr(ref bytes) => bytes.is_empty(),
            CommandErrorKind::Io(_) => false,
        }
    }
}

impl std::error::Error for CommandError {}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            CommandErrorKind::Io(ref err) => err.fmt(f),
            CommandErrorKind::Stderr(ref bytes) => {
                let msg = String::from_utf8_lossy(bytes);
                if msg.trim().is_empty() {
                    write!(f, "<stderr пуст>")
                } else {
                    write!(f, "{}", msg.trim())
                }
            }
        }
    }
}

impl From<io::Error> for CommandError {
    fn from(err: io::Error) -> CommandError {
        CommandError { kind: CommandErrorKind::Io(err) }
    }
}

impl From<CommandError> for io::Error {
    fn from(err: CommandError) -> io::Error {
        match err.kind {
            CommandErrorKind::Io(err) => err,
            CommandErrorKind::Stderr(_) => io::Error::other(err),
        }
    }
}

/// Потоковый читатель stdout дочернего процесса.
#[derive(Debug)]
pub struct CommandReader {
    child: process::Child,
    stderr: Option<std::thread::JoinHandle<CommandError>>,
    /// Выставляется, когда чтение дошло до конца. Если читатель
    /// закрывается раньше, разрыв канала у дочернего процесса — штатная
    /// ситуация, и его ненулевой код выхода с пустым stderr прощается.
    eof: bool,
}

impl CommandReader {
    /// Запустить команду и начать потоковое чтение её stdout.
    ///
    /// Аргументы, окружение и рабочий каталог command настраивает
    /// вызывающий; каналы stdout и stderr переопределяются здесь.
    pub fn new(
        command: &mut process::Command,
    ) -> Result<CommandReader, CommandError> {
        let mut child = command
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn()?;
        let mut stderr_pipe = child.stderr.take().unwrap();
        let stderr = std::thread::spawn(move || {
            let mut bytes = vec![];
            match stderr_pipe.read_to_end(&mut bytes) {
                Ok(_) => CommandError::stderr(bytes),
                Err(err) => CommandError::from(err),
            }
        });
        Ok(CommandReader { child, stderr: Some(stderr), eof: false })
    }

    /// Закрыть читатель и собрать дочерний процесс.
    ///
    /// Идемпотентен. При ненулевом коде выхода возвращает ошибку с
    /// содержимым stderr процесса. Вызывается сам при чтении до конца и
    /// в `drop` как последний рубеж от утечки зомби-процессов.
    pub fn close(&mut self) -> io::Result<()> {
        let stdout = match self.child.stdout.take() {
            None => return Ok(()),
            Some(stdout) => stdout,
        };
        // Закрытие stdout побуждает процесс завершиться самостоятельно.
        drop(stdout);
        if self.child.wait()?.success() {
            Ok(())
        } else {
            let err = match self.stderr.take() {
                None => return Ok(()),
                Some(handle) => handle
                    .join()
                    .unwrap_or_else(|_| CommandError::stderr(vec![])),
            };
            if !self.eof && err.is_empty() {
                return Ok(());
            }
            Err(io::Error::from(err))
        }
    }
}

impl Drop for CommandReader {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("{}", err);
        }
    }
}

impl Read for CommandReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stdout = match self.child.stdout {
            None => return Ok(0),
            Some(ref mut stdout) => stdout,
        };
        let nread = stdout.read(buf)?;
        if nread == 0 {
            self.eof = true;
            self.close().map(|_| 0)
        } else {
            Ok(nread)
        }
    }
}
