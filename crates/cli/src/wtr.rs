/*!
Писатель результатов: stdout с подходящей буферизацией или канал к
пейджеру.

На терминале используется построчная буферизация, чтобы пользователь
видел вывод по мере его появления; иначе — блочная, она заметно дешевле
на больших объёмах. Пейджер — это дочерний процесс, в stdin которого
уходит весь вывод; его завершения нужно дождаться, иначе терминал
останется в его власти.
*/

use std::{
    io::{self, Write},
    process,
};

/// Писатель вывода: stdout или канал к пейджеру.
#[derive(Debug)]
pub struct OutputWriter(OutputWriterKind);

#[derive(Debug)]
enum OutputWriterKind {
    LineBuffered(termcolor::StandardStream),
    BlockBuffered(termcolor::BufferedStandardStream),
    Pager(PagerWriter),
}

/// Писатель в stdout с автоматическим выбором буферизации: построчная
/// на терминале, блочная иначе.
pub fn stdout() -> OutputWriter {
    if crate::is_tty_stdout() {
        stdout_buffered_line()
    } else {
        stdout_buffered_block()
    }
}

/// Построчно буферизированный писатель в stdout.
pub fn stdout_buffered_line() -> OutputWriter {
    OutputWriter(OutputWriterKind::LineBuffered(
        termcolor::StandardStream::stdout(termcolor::ColorChoice::Never),
    ))
}

/// Блочно буферизированный писатель в stdout.
pub fn stdout_buffered_block() -> OutputWriter {
    OutputWriter(OutputWriterKind::BlockBuffered(
        termcolor::BufferedStandardStream::stdout(
            termcolor::ColorChoice::Never,
        ),
    ))
}

impl OutputWriter {
    /// Запустить пейджер и направить весь вывод в его stdin.
    ///
    /// Команда интерпретируется оболочкой, чтобы работали привычные
    /// значения вроде `less -R`.
    pub fn pager(command: &str) -> io::Result<OutputWriter> {
        let child = process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(process::Stdio::piped())
            .spawn()?;
        Ok(OutputWriter(OutputWriterKind::Pager(PagerWriter {
            child,
            closed: false,
        })))
    }

    /// Дописать хвосты и дождаться пейджера, если он был запущен.
    ///
    /// Для писателей в stdout это обычный сброс буфера.
    pub fn close(&mut self) -> io::Result<()> {
        match self.0 {
            OutputWriterKind::LineBuffered(ref mut wtr) => wtr.flush(),
            OutputWriterKind::BlockBuffered(ref mut wtr) => wtr.flush(),
            OutputWriterKind::Pager(ref mut pager) => pager.close(),
        }
    }

    /// Идёт ли вывод в пейджер.
    pub fn is_pager(&self) -> bool {
        matches!(self.0, OutputWriterKind::Pager(_))
    }
}

impl Write for OutputWriter {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0 {
            OutputWriterKind::LineBuffered(ref mut wtr) => wtr.write(buf),
            OutputWriterKind::BlockBuffered(ref mut wtr) => wtr.write(buf),
            OutputWriterKind::Pager(ref mut pager) => pager.write(buf),
        }
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        match self.0 {
            OutputWriterKind::LineBuffered(ref mut wtr) => wtr.flush(),
            OutputWriterKind::BlockBuffered(ref mut wtr) => wtr.flush(),
            OutputWriterKind::Pager(ref mut pager) => pager.flush(),
        }
    }
}

/// Канал к запущенному пейджеру.
#[derive(Debug)]
struct PagerWriter {
    child: process::Child,
    closed: bool,
}

impl PagerWriter {
    /// Закрыть stdin пейджера и дождаться его завершения.
    ///
    /// Идемпотентно: повторные вызовы ничего не делают.
    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        drop(self.child.stdin.take());
        self.child.wait().map(|_| ())
    }
}

impl Drop for PagerWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("пейджер завершился с ошибкой: {err}");
        }
    }
}

impl Write for PagerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.child.stdin {
            // Разрыв канала: пейджер уже вышел, вывод больше не нужен.
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
            Some(ref mut stdin) => stdin.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.child.stdin {
            None => Ok(()),
            Some(ref mut stdin) => stdin.flush(),
        }
    }
}
