/*!
Крейт unigrep-searcher отвечает за доставку байтов из разнородных
источников ввода к поисковому движку.

Для обычного файла под ограничением размера и без перекодировки ввод
отображается в память; иначе используется потоковый читатель — буферный
для файлов, обычный для каналов и устройств, поверх распаковщика или
перекодировщика, когда они запрошены. Движку всё равно, какой вариант он
держит: оба отвечают на «дай следующую строку» и «дай весь буфер».
*/

use std::{
    fs::File,
    io::{self, Read},
    ops::Deref,
    path::Path,
};

pub use crate::{
    binary::is_binary,
    encoding::Encoding,
    lines::{ContextRing, LineRecord, LineSource},
};

mod binary;
mod encoding;
mod lines;

/// Максимальный размер файла для отображения в память. Файлы крупнее
/// читаются потоком.
pub const MAX_MMAP_SIZE: u64 = 4294967295;

/// Один источник ввода: либо отображённый в память файл, либо поток.
#[derive(Debug)]
pub struct Input {
    kind: InputKind,
}

enum InputKind {
    Mmap(memmap2::Mmap),
    Reader(Box<dyn Read>),
}

impl std::fmt::Debug for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            InputKind::Mmap(ref map) => {
                f.debug_tuple("Mmap").field(&map.len()).finish()
            }
            InputKind::Reader(_) => f.debug_tuple("Reader").finish(),
        }
    }
}

impl Input {
    /// Открыть файл с предпочтительной стратегией чтения.
    ///
    /// Отображение в память возможно только для обычного файла размером
    /// не более [`MAX_MMAP_SIZE`] и только без перекодировки. Неудача
    /// отображения не фатальна: происходит откат к буферному чтению.
    pub fn open(path: &Path, encoding: Encoding) -> io::Result<Input> {
        let file = File::open(path)?;
        if encoding.is_plain() {
            let metadata = file.metadata()?;
            if metadata.is_file() && metadata.len() <= MAX_MMAP_SIZE {
                // Файл может быть изменён другим процессом во время
                // чтения, тогда содержимое региона «поплывёт». Это общий
                // риск всех grep-подобных инструментов с mmap.
                match unsafe { memmap2::Mmap::map(&file) } {
                    Ok(map) => {
                        return Ok(Input { kind: InputKind::Mmap(map) });
                    }
                    Err(err) => {
                        log::debug!(
                            "{}: mmap не удался, откат к чтению потоком: {err}",
                            path.display(),
                        );
                    }
                }
            }
        }
        Ok(Input::from_reader(Box::new(file), encoding))
    }

    /// Обернуть произвольный читатель (stdin, распаковщик, препроцессор)
    /// с учётом перекодировки.
    pub fn from_reader(rdr: Box<dyn Read>, encoding: Encoding) -> Input {
        Input { kind: InputKind::Reader(encoding.wrap(rdr)) }
    }

    /// Стандартный ввод как источник.
    pub fn stdin(encoding: Encoding) -> Input {
        Input::from_reader(Box::new(io::stdin()), encoding)
    }

    /// Источник из готового буфера; используется в тестах.
    pub fn from_bytes(data: Vec<u8>) -> Input {
        Input { kind: InputKind::Reader(Box::new(io::Cursor::new(data))) }
    }

    /// Прочитать весь ввод как один буфер.
    ///
    /// Для отображённого файла это сам регион без копирования; поток
    /// дочитывается до конца в кучу. Нужно режимам, которые сканируют
    /// весь ввод целиком (-q, -l, -L, -o, -c с -g).
    pub fn into_buffer(self) -> io::Result<InputBuffer> {
        match self.kind {
            InputKind::Mmap(map) => Ok(InputBuffer::Mapped(map)),
            InputKind::Reader(mut rdr) => {
                let mut buf = vec![];
                rdr.read_to_end(&mut buf)?;
                Ok(InputBuffer::Heap(buf))
            }
        }
    }

    /// Превратить ввод в построчный источник.
    pub fn into_lines(self) -> LineSource {
        match self.kind {
            InputKind::Mmap(map) => LineSource::from_mmap(map),
            InputKind::Reader(rdr) => LineSource::from_reader(rdr),
        }
    }
}

/// Весь ввод одним куском: регион отображения или буфер в куче.
#[derive(Debug)]
pub enum InputBuffer {
    Mapped(memmap2::Mmap),
    Heap(Vec<u8>),
}

impl Deref for InputBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match *self {
            InputBuffer::Mapped(ref map) => map,
            InputBuffer::Heap(ref buf) => buf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_from_reader() {
        let input = Input::from_bytes(b"foo\nbar\n".to_vec());
        let buf = input.into_buffer().unwrap();
        assert_eq!(&*buf, b"foo\nbar\n");
    }

    #[test]
    fn lines_from_reader() {
        let input = Input::from_bytes(b"foo\nbar".to_vec());
        let mut lines = input.into_lines();
        let mut line = vec![];
        assert!(lines.read_line(&mut line).unwrap());
        assert_eq!(line, b"foo\n");
        assert!(lines.read_line(&mut line).unwrap());
        assert_eq!(line, b"bar");
        assert!(!lines.read_line(&mut line).unwrap());
    }
}
