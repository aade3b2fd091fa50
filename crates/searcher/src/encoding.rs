/*!
Перекодировка входных файлов в канонический вид движка (UTF-8).

UTF-16 и кодовые страницы Windows декодирует `encoding_rs` (потоково,
через `encoding_rs_io`); маркер порядка байтов, если он есть, имеет
приоритет над заявленной кодировкой. UTF-32, настоящую ISO-8859-1,
DOS-страницы CP437/CP850/CP858 и EBCDIC `encoding_rs` сознательно не
поддерживает, поэтому они перекодируются здесь же по таблицам.

Смещения байтов, которые видит пользователь, после перекодировки
относятся к перекодированному потоку.
*/

use std::io::{self, Read};

use encoding_rs_io::DecodeReaderBytesBuilder;

/// Кодировка входных файлов, заявленная опцией -Q.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Encoding {
    /// Байты как есть, без какой-либо перекодировки.
    #[default]
    Plain,
    /// UTF-8 или ASCII: сквозной проход со срезанием маркера BOM.
    Utf8,
    Latin1,
    Ebcdic,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
    Cp437,
    Cp850,
    Cp858,
    Cp1250,
    Cp1251,
    Cp1252,
    Cp1253,
    Cp1254,
    Cp1255,
    Cp1256,
    Cp1257,
    Cp1258,
}

impl Encoding {
    /// Распознать имя кодировки из -Q. Имена фиксированы, регистр значим.
    pub fn from_name(name: &str) -> Option<Encoding> {
        Some(match name {
            "binary" => Encoding::Plain,
            "ISO-8859-1" => Encoding::Latin1,
            "ASCII" => Encoding::Utf8,
            "EBCDIC" => Encoding::Ebcdic,
            "UTF-8" => Encoding::Utf8,
            "UTF-16" => Encoding::Utf16Be,
            "UTF-16BE" => Encoding::Utf16Be,
            "UTF-16LE" => Encoding::Utf16Le,
            "UTF-32" => Encoding::Utf32Be,
            "UTF-32BE" => Encoding::Utf32Be,
            "UTF-32LE" => Encoding::Utf32Le,
            "CP437" => Encoding::Cp437,
            "CP850" => Encoding::Cp850,
            "CP858" => Encoding::Cp858,
            "CP1250" => Encoding::Cp1250,
            "CP1251" => Encoding::Cp1251,
            "CP1252" => Encoding::Cp1252,
            "CP1253" => Encoding::Cp1253,
            "CP1254" => Encoding::Cp1254,
            "CP1255" => Encoding::Cp1255,
            "CP1256" => Encoding::Cp1256,
            "CP1257" => Encoding::Cp1257,
            "CP1258" => Encoding::Cp1258,
            _ => return None,
        })
    }

    /// Нужна ли этому вводу перекодировка. «Простой» ввод можно
    /// отображать в память.
    pub fn is_plain(&self) -> bool {
        matches!(*self, Encoding::Plain)
    }

    /// Обернуть читатель перекодировщиком в UTF-8.
    pub fn wrap(self, rdr: Box<dyn Read>) -> Box<dyn Read> {
        use encoding_rs::{
            UTF_16BE, UTF_16LE, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252,
            WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256,
            WINDOWS_1257, WINDOWS_1258,
        };

        match self {
            Encoding::Plain => rdr,
            Encoding::Utf8 => Box::new(
                DecodeReaderBytesBuilder::new()
                    .utf8_passthru(true)
                    .build(rdr),
            ),
            Encoding::Utf16Be => decode_with(rdr, UTF_16BE),
            Encoding::Utf16Le => decode_with(rdr, UTF_16LE),
            Encoding::Cp1250 => decode_with(rdr, WINDOWS_1250),
            Encoding::Cp1251 => decode_with(rdr, WINDOWS_1251),
            Encoding::Cp1252 => decode_with(rdr, WINDOWS_1252),
            Encoding::Cp1253 => decode_with(rdr, WINDOWS_1253),
            Encoding::Cp1254 => decode_with(rdr, WINDOWS_1254),
            Encoding::Cp1255 => decode_with(rdr, WINDOWS_1255),
            Encoding::Cp1256 => decode_with(rdr, WINDOWS_1256),
            Encoding::Cp1257 => decode_with(rdr, WINDOWS_1257),
            Encoding::Cp1258 => decode_with(rdr, WINDOWS_1258),
            Encoding::Latin1 => Box::new(ByteMapReader::new(rdr, &LATIN1)),
            Encoding::Ebcdic => Box::new(ByteMapReader::new(rdr, &EBCDIC)),
            Encoding::Cp437 => Box::new(ByteMapReader::new(rdr, &CP437)),
            Encoding::Cp850 => Box::new(ByteMapReader::new(rdr, &CP850)),
            Encoding::Cp858 => Box::new(ByteMapReader::new(rdr, &CP858)),
            Encoding::Utf32Be => Box::new(Utf32Reader::new(rdr, true)),
            Encoding::Utf32Le => Box::new(Utf32Reader::new(rdr, false)),
        }
    }
}

fn decode_with(
    rdr: Box<dyn Read>,
    enc: &'static encoding_rs::Encoding,
) -> Box<dyn Read> {
    Box::new(
        DecodeReaderBytesBuilder::new()
            .encoding(Some(enc))
            .bom_override(true)
            .build(rdr),
    )
}

/// Побайтовый перекодировщик для однобайтовых кодировок.
struct ByteMapReader<R> {
    inner: R,
    table: &'static [u16; 256],
    out: Vec<u8>,
    pos: usize,
}

impl<R: Read> ByteMapReader<R> {
    fn new(inner: R, table: &'static [u16; 256]) -> ByteMapReader<R> {
        ByteMapReader { inner, table, out: vec![], pos: 0 }
    }
}

impl<R: Read> Read for ByteMapReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.out.len() {
            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                return Ok(0);
            }
            self.out.clear();
            self.pos = 0;
            for &byte in &chunk[..n] {
                let ch = char::from_u32(u32::from(self.table[byte as usize]))
                    .unwrap_or('\u{FFFD}');
                let mut utf8 = [0u8; 4];
                self.out
                    .extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
        }
        let n = (self.out.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Потоковый декодер UTF-32. Маркер порядка байтов в начале потока
/// перекрывает заявленный порядок; неполная последняя единица и
/// недопустимые кодовые точки заменяются на U+FFFD.
struct Utf32Reader<R> {
    inner: R,
    big_endian: bool,
    sniffed: bool,
    eof: bool,
    pending: Vec<u8>,
    out: Vec<u8>,
    pos: usize,
}

impl<R: Read> Utf32Reader<R> {
    fn new(inner: R, big_endian: bool) -> Utf32Reader<R> {
        Utf32Reader {
            inner,
            big_endian,
            sniffed: false,
            eof: false,
            pending: vec![],
            out: vec![],
            pos: 0,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        let n = self.inner.read(&mut chunk)?;
        if n == 0 {
            self.eof = true;
        }
        self.pending.extend_from_slice(&chunk[..n]);
        if !self.sniffed && (self.pending.len() >= 4 || self.eof) {
            self.sniffed = true;
            if self.pending.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
                self.big_endian = true;
                self.pending.drain(..4);
            } else if self.pending.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
                self.big_endian = false;
                self.pending.drain(..4);
            }
        }
        if !self.sniffed {
            return Ok(());
        }
        self.out.clear();
        self.pos = 0;
        let whole = self.pending.len() / 4 * 4;
        for unit in self.pending[..whole].chunks_exact(4) {
            let raw = if self.big_endian {
                u32::from_be_bytes([unit[0], unit[1], unit[2], unit[3]])
            } else {
                u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])
            };
            let ch = char::from_u32(raw).unwrap_or('\u{FFFD}');
            let mut utf8 = [0u8; 4];
            self.out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
        }
        self.pending.drain(..whole);
        if self.eof && !self.pending.is_empty() {
            // Оборванная последняя единица.
            self.out.extend_from_slice("\u{FFFD}".as_bytes());
            self.pending.clear();
        }
        Ok(())
    }
}

impl<R: Read> Read for Utf32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.out.len() {
            if self.eof {
                return Ok(0);
            }
            self.refill()?;
        }
        let n = (self.out.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

const fn latin1_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u16;
        i += 1;
    }
    table
}

/// Собрать таблицу DOS-страницы: нижняя половина — ASCII, верхняя задана.
const fn dos_table(high: &[u16; 128]) -> [u16; 256] {
    let mut table = latin1_table();
    let mut i = 0;
    while i < 128 {
        table[128 + i] = high[i];
        i += 1;
    }
    table
}

static LATIN1: [u16; 256] = latin1_table();

static CP437: [u16; 256] = dos_table(&[
    0x00C7, 0x00FC, 0x00E9, 0x00E2, 0x00E4, 0x00E0, 0x00E5, 0x00E7,
    0x00EA, 0x00EB, 0x00E8, 0x00EF, 0x00EE, 0x00EC, 0x00C4, 0x00C5,
    0x00C9, 0x00E6, 0x00C6, 0x00F4, 0x00F6, 0x00F2, 0x00FB, 0x00F9,
    0x00FF, 0x00D6, 0x00DC, 0x00A2, 0x00A3, 0x00A5, 0x20A7, 0x0192,
    0x00E1, 0x00ED, 0x00F3, 0x00FA, 0x00F1, 0x00D1, 0x00AA, 0x00BA,
    0x00BF, 0x2310, 0x00AC, 0x00BD, 0x00BC, 0x00A1, 0x00AB, 0x00BB,
    0x2591, 0x2592, 0x2593, 0x2502, 0x2524, 0x2561, 0x2562, 0x2556,
    0x2555, 0x2563, 0x2551, 0x2557, 0x255D, 0x255C, 0x255B, 0x2510,
    0x2514, 0x2534, 0x252C, 0x251C, 0x2500, 0x253C, 0x255E, 0x255F,
    0x255A, 0x2554, 0x2569, 0x2566, 0x2560, 0x2550, 0x256C, 0x2567,
    0x2568, 0x2564, 0x2565, 0x2559, 0x2558, 0x2552, 0x2553, 0x256B,
    0x256A, 0x2518, 0x250C, 0x2588, 0x2584, 0x258C, 0x2590, 0x2580,
    0x03B1, 0x00DF, 0x0393, 0x03C0, 0x03A3, 0x03C3, 0x00B5, 0x03C4,
    0x03A6, 0x0398, 0x03A9, 0x03B4, 0x221E, 0x03C6, 0x03B5, 0x2229,
    0x2261, 0x00B1, 0x2265, 0x2264, 0x2320, 0x2321, 0x00F7, 0x2248,
    0x00B0, 0x2219, 0x00B7, 0x221A, 0x207F, 0x00B2, 0x25A0, 0x00A0,
]);

const CP850_HIGH: [u16; 128] = [
    0x00C7, 0x00FC, 0x00E9, 0x00E2, 0x00E4, 0x00E0, 0x00E5, 0x00E7,
    0x00EA, 0x00EB, 0x00E8, 0x00EF, 0x00EE, 0x00EC, 0x00C4, 0x00C5,
    0x00C9, 0x00E6, 0x00C6, 0x00F4, 0x00F6, 0x00F2, 0x00FB, 0x00F9,
    0x00FF, 0x00D6, 0x00DC, 0x00F8, 0x00A3, 0x00D8, 0x00D7, 0x0192,
    0x00E1, 0x00ED, 0x00F3, 0x00FA, 0x00F1, 0x00D1, 0x00AA, 0x00BA,
    0x00BF, 0x00AE, 0x00AC, 0x00BD, 0x00BC, 0x00A1, 0x00AB, 0x00BB,
    0x2591, 0x2592, 0x2593, 0x2502, 0x2524, 0x00C1, 0x00C2, 0x00C0,
    0x00A9, 0x2563, 0x2551, 0x2557, 0x255D, 0x00A2, 0x00A5, 0x2510,
    0x2514, 0x2534, 0x252C, 0x251C, 0x2500, 0x253C, 0x00E3, 0x00C3,
    0x255A, 0x2554, 0x2569, 0x2566, 0x2560, 0x2550, 0x256C, 0x00A4,
    0x00F0, 0x00D0, 0x00CA, 0x00CB, 0x00C8, 0x0131, 0x00CD, 0x00CE,
    0x00CF, 0x2518, 0x250C, 0x2588, 0x2584, 0x00A6, 0x00CC, 0x2580,
    0x00D3, 0x00DF, 0x00D4, 0x00D2, 0x00F5, 0x00D5, 0x00B5, 0x00FE,
    0x00DE, 0x00DA, 0x00DB, 0x00D9, 0x00FD, 0x00DD, 0x00AF, 0x00B4,
    0x00AD, 0x00B1, 0x2017, 0x00BE, 0x00B6, 0x00A7, 0x00F7, 0x00B8,
    0x00B0, 0x00A8, 0x00B7, 0x00B9, 0x00B3, 0x00B2, 0x25A0, 0x00A0,
];

static CP850: [u16; 256] = dos_table(&CP850_HIGH);

/// CP858 отличается от CP850 единственной ячейкой: точечная «ı» на
/// месте 0xD5 заменена знаком евро.
static CP858: [u16; 256] = {
    let mut table = dos_table(&CP850_HIGH);
    table[0xD5] = 0x20AC;
    table
};

/// EBCDIC, кодовая страница 1047 («открытые системы»): перевод строки
/// лежит в 0x15, латиница-1 покрыта целиком.
static EBCDIC: [u16; 256] = [
    0x0000, 0x0001, 0x0002, 0x0003, 0x009C, 0x0009, 0x0086, 0x007F,
    0x0097, 0x008D, 0x008E, 0x000B, 0x000C, 0x000D, 0x000E, 0x000F,
    0x0010, 0x0011, 0x0012, 0x0013, 0x009D, 0x000A, 0x0008, 0x0087,
    0x0018, 0x0019, 0x0092, 0x008F, 0x001C, 0x001D, 0x001E, 0x001F,
    0x0080, 0x0081, 0x0082, 0x0083, 0x0084, 0x0085, 0x0017, 0x001B,
    0x0088, 0x0089, 0x008A, 0x008B, 0x008C, 0x0005, 0x0006, 0x0007,
    0x0090, 0x0091, 0x0016, 0x0093, 0x0094, 0x0095, 0x0096, 0x0004,
    0x0098, 0x0099, 0x009A, 0x009B, 0x0014, 0x0015, 0x009E, 0x001A,
    0x0020, 0x00A0, 0x00E2, 0x00E4, 0x00E0, 0x00E1, 0x00E3, 0x00E5,
    0x00E7, 0x00F1, 0x00A2, 0x002E, 0x003C, 0x0028, 0x002B, 0x007C,
    0x0026, 0x00E9, 0x00EA, 0x00EB, 0x00E8, 0x00ED, 0x00EE, 0x00EF,
    0x00EC, 0x00DF, 0x0021, 0x0024, 0x002A, 0x0029, 0x003B, 0x005E,
    0x002D, 0x002F, 0x00C2, 0x00C4, 0x00C0, 0x00C1, 0x00C3, 0x00C5,
    0x00C7, 0x00D1, 0x00A6, 0x002C, 0x0025, 0x005F, 0x003E, 0x003F,
    0x00F8, 0x00C9, 0x00CA, 0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF,
    0x00CC, 0x0060, 0x003A, 0x0023, 0x0040, 0x0027, 0x003D, 0x0022,
    0x00D8, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067,
    0x0068, 0x0069, 0x00AB, 0x00BB, 0x00F0, 0x00FD, 0x00FE, 0x00B1,
    0x00B0, 0x006A, 0x006B, 0x006C, 0x006D, 0x006E, 0x006F, 0x0070,
    0x0071, 0x0072, 0x00AA, 0x00BA, 0x00E6, 0x00B8, 0x00C6, 0x00A4,
    0x00B5, 0x007E, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077, 0x0078,
    0x0079, 0x007A, 0x00A1, 0x00BF, 0x00D0, 0x005B, 0x00DE, 0x00AE,
    0x00AC, 0x00A3, 0x00A5, 0x00B7, 0x00A9, 0x00A7, 0x00B6, 0x00BC,
    0x00BD, 0x00BE, 0x00DD, 0x00A8, 0x00AF, 0x005D, 0x00B4, 0x00D7,
    0x007B, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047,
    0x0048, 0x0049, 0x00AD, 0x00F4, 0x00F6, 0x00F2, 0x00F3, 0x00F5,
    0x007D, 0x004A, 0x004B, 0x004C, 0x004D, 0x004E, 0x004F, 0x0050,
    0x0051, 0x0052, 0x00B9, 0x00FB, 0x00FC, 0x00F9, 0x00FA, 0x00FF,
    0x005C, 0x00F7, 0x0053, 0x0054, 0x0055, 0x0056, 0x0057, 0x0058,
    0x0059, 0x005A, 0x00B2, 0x00D4, 0x00D6, 0x00D2, 0x00D3, 0x00D5,
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037,
    0x0038, 0x0039, 0x00B3, 0x00DB, 0x00DC, 0x00D9, 0x00DA, 0x009F,
];

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::Encoding;

    fn decode(enc: Encoding, data: &[u8]) -> Vec<u8> {
        let mut rdr = enc.wrap(Box::new(Cursor::new(data.to_vec())));
        let mut out = vec![];
        rdr.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn known_names_resolve() {
        assert_eq!(Encoding::from_name("binary"), Some(Encoding::Plain));
        assert_eq!(Encoding::from_name("UTF-16"), Some(Encoding::Utf16Be));
        assert_eq!(Encoding::from_name("CP1251"), Some(Encoding::Cp1251));
        assert_eq!(Encoding::from_name("utf-8"), None);
        assert_eq!(Encoding::from_name("KOI8-R"), None);
    }

    #[test]
    fn utf8_bom_is_stripped() {
        assert_eq!(decode(Encoding::Utf8, b"\xef\xbb\xbfhi\n"), b"hi\n");
    }

    #[test]
    fn utf16le_is_transcoded() {
        let data = b"h\x00i\x00\n\x00";
        assert_eq!(decode(Encoding::Utf16Le, data), b"hi\n");
    }

    #[test]
    fn utf16_bom_overrides_declared_order() {
        // Заявлен BE, но маркер говорит LE.
        let data = b"\xff\xfeh\x00i\x00";
        assert_eq!(decode(Encoding::Utf16Be, data), b"hi");
    }

    #[test]
    fn utf32be_is_transcoded() {
        let data = b"\x00\x00\x00h\x00\x00\x00i\x00\x00\x00\n";
        assert_eq!(decode(Encoding::Utf32Be, data), b"hi\n");
    }

    #[test]
    fn utf32_bom_overrides_declared_order() {
        let data = b"\xff\xfe\x00\x00h\x00\x00\x00";
        assert_eq!(decode(Encoding::Utf32Be, data), b"h");
    }

    #[test]
    fn latin1_high_bytes() {
        // 0xE9 — «é» в ISO-8859-1.
        assert_eq!(decode(Encoding::Latin1, b"caf\xe9"), "café".as_bytes());
    }

    #[test]
    fn cp437_box_drawing() {
        // 0xC9 — двойной угол «╔» в CP437.
        assert_eq!(decode(Encoding::Cp437, b"\xc9"), "╔".as_bytes());
    }

    #[test]
    fn cp858_euro_sign() {
        assert_eq!(decode(Encoding::Cp858, b"\xd5"), "€".as_bytes());
        // В CP850 та же ячейка — «ı».
        assert_eq!(decode(Encoding::Cp850, b"\xd5"), "ı".as_bytes());
    }

    #[test]
    fn ebcdic_text_and_newline() {
        let data = b"\x88\x85\x93\x93\x96\x15";
        assert_eq!(decode(Encoding::Ebcdic, data), b"hello\n");
    }
}
