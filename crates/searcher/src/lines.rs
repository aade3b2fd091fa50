/*!
Единый построчный источник и кольцо контекста.

Источник выдаёт очередную строку вместе с завершающим переводом строки
(последняя строка файла может прийти без него) независимо от того, лежит
ли ввод в отображённой памяти или приходит из потока. Кольцо контекста
хранит последние строки для вывода окна -B по требованию.
*/

use std::io::{self, BufRead, Read};

/// Построчный источник байтов.
#[derive(Debug)]
pub struct LineSource {
    kind: SourceKind,
}

enum SourceKind {
    /// Срез отображённого файла; позиция — начало следующей строки.
    Mapped { map: memmap2::Mmap, pos: usize },
    /// Потоковый ввод через буферный читатель.
    Stream { rdr: io::BufReader<Box<dyn Read>> },
}

impl std::fmt::Debug for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SourceKind::Mapped { ref map, pos } => f
                .debug_struct("Mapped")
                .field("len", &map.len())
                .field("pos", &pos)
                .finish(),
            SourceKind::Stream { .. } => {
                f.debug_struct("Stream").finish()
            }
        }
    }
}

impl LineSource {
    pub(crate) fn from_mmap(map: memmap2::Mmap) -> LineSource {
        LineSource { kind: SourceKind::Mapped { map, pos: 0 } }
    }

    pub(crate) fn from_reader(rdr: Box<dyn Read>) -> LineSource {
        LineSource {
            kind: SourceKind::Stream { rdr: io::BufReader::new(rdr) },
        }
    }

    /// Прочитать следующую строку в `line`, включая завершающий `\n`,
    /// если он есть. Возвращает false на конце ввода.
    pub fn read_line(&mut self, line: &mut Vec<u8>) -> io::Result<bool> {
        line.clear();
        match self.kind {
            SourceKind::Mapped { ref map, ref mut pos } => {
                if *pos >= map.len() {
                    return Ok(false);
                }
                let end = match memchr::memchr(b'\n', &map[*pos..]) {
                    Some(i) => *pos + i + 1,
                    None => map.len(),
                };
                line.extend_from_slice(&map[*pos..end]);
                *pos = end;
                Ok(true)
            }
            SourceKind::Stream { ref mut rdr } => {
                Ok(rdr.read_until(b'\n', line)? > 0)
            }
        }
    }
}

/// Одна прочитанная строка вместе с её положением в файле.
#[derive(Clone, Debug, Default)]
pub struct LineRecord {
    /// Байты строки, включая завершающий перевод строки, если он был.
    pub buf: Vec<u8>,
    /// Смещение начала строки от начала файла.
    pub offset: u64,
    /// Содержит ли строка двоичные данные.
    pub binary: bool,
}

/// Кольцо из `before_context + 1` последних строк.
///
/// Слот строки с номером `lineno` — это `lineno % (before_context + 1)`;
/// текущая строка всегда занимает свой слот, а остальные слоты хранят
/// предшествующие строки, пока их не вытеснит новая с тем же остатком.
/// Слот переиспользуется только после того, как его содержимое было
/// выведено любым отложенным окном -B.
#[derive(Clone, Debug)]
pub struct ContextRing {
    slots: Vec<LineRecord>,
}

impl ContextRing {
    /// Создать кольцо для окна из `before_context` строк.
    pub fn new(before_context: usize) -> ContextRing {
        ContextRing {
            slots: vec![LineRecord::default(); before_context + 1],
        }
    }

    /// Слот строки с данным номером (нумерация с единицы).
    pub fn slot(&self, lineno: u64) -> &LineRecord {
        let n = self.slots.len() as u64;
        &self.slots[(lineno % n) as usize]
    }

    /// Изменяемый слот строки с данным номером.
    pub fn slot_mut(&mut self, lineno: u64) -> &mut LineRecord {
        let n = self.slots.len() as u64;
        &mut self.slots[(lineno % n) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_lines_keep_terminators() {
        let mut src = LineSource::from_reader(Box::new(io::Cursor::new(
            b"a\n\nbb".to_vec(),
        )));
        let mut line = vec![];
        assert!(src.read_line(&mut line).unwrap());
        assert_eq!(line, b"a\n");
        assert!(src.read_line(&mut line).unwrap());
        assert_eq!(line, b"\n");
        assert!(src.read_line(&mut line).unwrap());
        assert_eq!(line, b"bb");
        assert!(!src.read_line(&mut line).unwrap());
        assert!(line.is_empty());
    }

    #[test]
    fn ring_keeps_most_recent_lines() {
        let mut ring = ContextRing::new(2);
        for lineno in 1..=5u64 {
            let slot = ring.slot_mut(lineno);
            slot.buf = format!("line {lineno}\n").into_bytes();
            slot.offset = (lineno - 1) * 7;
        }
        // После пятой строки кольцо держит строки 3, 4 и 5.
        assert_eq!(ring.slot(3).buf, b"line 3\n");
        assert_eq!(ring.slot(4).buf, b"line 4\n");
        assert_eq!(ring.slot(5).buf, b"line 5\n");
        // Слот строки 5 совпадает со слотом строки 2, которую она вытеснила.
        assert_eq!(ring.slot(2).buf, b"line 5\n");
    }
}
