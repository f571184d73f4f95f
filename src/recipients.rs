//! 受信者番号の解析と正規化（ケニアのMSISDN形式）。

use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATOR_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-+()]").expect("compile separator regex"));
static LIST_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\n,]+").expect("compile list delimiter regex"));
static KENYAN_MSISDN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^254[17]\d{8}$").expect("compile msisdn regex"));

/// 国内形式の番号を `254` で始まる国際形式へ変換する。
///
/// 空白・ハイフン・`+`・括弧を除去したうえで、`07…` / `01…` は先頭の0を `254` に、
/// `7` で始まる9桁は `254` を前置する。それ以外はそのまま返す。
#[must_use]
pub fn format_phone_number(phone: &str) -> String {
    let stripped = SEPARATOR_CHARS.replace_all(phone, "");
    if stripped.starts_with("07") || stripped.starts_with("01") {
        return format!("254{}", &stripped[1..]);
    }
    if stripped.starts_with('7') && stripped.len() == 9 {
        return format!("254{stripped}");
    }
    stripped.into_owned()
}

/// 正規化後に `254` + `1`/`7` + 8桁になるかを判定する。
#[must_use]
pub fn is_valid_phone(phone: &str) -> bool {
    KENYAN_MSISDN.is_match(&format_phone_number(phone))
}

fn split_entries(text: &str) -> impl Iterator<Item = &str> {
    LIST_DELIMITER
        .split(text)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

/// 改行またはカンマ区切りのテキストから有効な番号だけを正規化して取り出す。
#[must_use]
pub fn parse_recipients(text: &str) -> Vec<String> {
    split_entries(text)
        .map(format_phone_number)
        .filter(|phone| is_valid_phone(phone))
        .collect()
}

/// 初出順を保ったまま重複を取り除く。
#[must_use]
pub fn unique_recipients(recipients: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(recipients.len());
    recipients
        .into_iter()
        .filter(|recipient| seen.insert(recipient.clone()))
        .collect()
}

#[must_use]
pub fn count_invalid_numbers(text: &str) -> usize {
    split_entries(text)
        .filter(|entry| !is_valid_phone(entry))
        .count()
}

/// 受信者リストを正規化・重複排除する。
///
/// # Errors
/// 無効な番号が1件でもあれば、その元の入力値を並び順のまま返す。
pub fn normalize_recipients(raw: &[String]) -> Result<Vec<String>, Vec<String>> {
    let mut normalized = Vec::with_capacity(raw.len());
    let mut invalid = Vec::new();
    for entry in raw {
        let formatted = format_phone_number(entry.trim());
        if KENYAN_MSISDN.is_match(&formatted) {
            normalized.push(formatted);
        } else {
            invalid.push(entry.clone());
        }
    }
    if invalid.is_empty() {
        Ok(unique_recipients(normalized))
    } else {
        Err(invalid)
    }
}
