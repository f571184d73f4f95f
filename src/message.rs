//! メッセージ本文の文字数とSMS分割数の計算。

use serde::Serialize;

/// 単一SMSに収まる最大文字数。
pub const SINGLE_SEGMENT_LIMIT: usize = 160;
/// 連結SMSでの1セグメントあたりの文字数。
pub const MULTIPART_SEGMENT_SIZE: usize = 153;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SmsCount {
    pub length: usize,
    pub segments: usize,
}

/// 本文の文字数と送信に必要なセグメント数を数える。
///
/// 文字数はUTF-16コード単位で数える。絵文字などサロゲートペアになる文字は2文字分になる。
#[must_use]
pub fn count_sms(message: &str) -> SmsCount {
    let length = message.encode_utf16().count();
    let segments = match length {
        0 => 0,
        1..=SINGLE_SEGMENT_LIMIT => 1,
        _ => length.div_ceil(MULTIPART_SEGMENT_SIZE),
    };
    SmsCount { length, segments }
}
