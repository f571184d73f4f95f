//! ログ出力用のマスキングヘルパー。

/// 電話番号の先頭4桁と末尾3桁だけを残してマスクする。
pub(crate) fn redact_recipient(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 7 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 7))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_middle_digits() {
        assert_eq!(redact_recipient("254712345678"), "2547*****678");
    }

    #[test]
    fn short_values_are_fully_masked() {
        assert_eq!(redact_recipient("12345"), "****");
        assert_eq!(redact_recipient(""), "****");
    }
}
