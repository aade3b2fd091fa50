/*!
Обнаружение двоичных данных.

Строка (или совпадение) считается двоичной, если она содержит байт NUL
или последовательность байтов, не являющуюся корректным UTF-8: хвостовой
байт без ведущего, оборванная многобайтовая последовательность и тому
подобное.
*/

/// Возвращает true, когда данные нельзя показать как текст.
pub fn is_binary(data: &[u8]) -> bool {
    memchr::memchr(b'\0', data).is_some()
        || std::str::from_utf8(data).is_err()
}

#[cfg(test)]
mod tests {
    use super::is_binary;

    #[test]
    fn plain_text_is_not_binary() {
        assert!(!is_binary(b"hello world\n"));
        assert!(!is_binary(b""));
        assert!(!is_binary("привет\n".as_bytes()));
    }

    #[test]
    fn nul_byte_is_binary() {
        assert!(is_binary(b"hello\x00world\n"));
    }

    #[test]
    fn stray_continuation_byte_is_binary() {
        assert!(is_binary(b"abc\x80def"));
    }

    #[test]
    fn truncated_multibyte_is_binary() {
        // Ведущий байт двухбайтовой последовательности без хвостового.
        assert!(is_binary(b"abc\xd0"));
        assert!(is_binary(b"abc\xd0x"));
    }

    #[test]
    fn complete_multibyte_is_text() {
        assert!(!is_binary(b"abc\xd0\xbfdef"));
    }
}
