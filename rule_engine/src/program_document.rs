// EPG program documents as returned by the search index
//
// Field names are the Japanese attribute names used in the index; the facet
// attributes in `search_query` refer to the same names.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// One program in the EPG search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDocument {
    #[serde(rename = "タイトル")]
    pub title: String,

    #[serde(rename = "番組情報")]
    pub description: String,

    #[serde(rename = "その他情報", default)]
    pub extended: String,

    #[serde(rename = "放送局")]
    pub channel: String,

    #[serde(rename = "ジャンル", default)]
    pub genres: Vec<String>,

    #[serde(rename = "開始時刻")]
    pub start_at: DateTime<Utc>,

    #[serde(rename = "終了時刻")]
    pub end_at: DateTime<Utc>,

    #[serde(rename = "放送曜日", default)]
    pub day_of_week: String,

    /// Duration in minutes
    #[serde(rename = "放送時間", default)]
    pub duration: i64,

    #[serde(rename = "公式サイト等", default)]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ogp_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ogp_url_hash: Option<String>,

    pub program_id: i64,
    pub service_id: i64,
}

impl ProgramDocument {
    /// One-line listing: `放送局 M/D 曜日 HH:MM～HH:MM genre, genre`.
    pub fn summary_line(&self, offset: &FixedOffset) -> String {
        let start = self.start_at.with_timezone(offset);
        let end = self.end_at.with_timezone(offset);
        format!(
            "{} {} {} {}～{} {}",
            self.channel,
            start.format("%-m/%-d"),
            self.day_of_week,
            start.format("%H:%M"),
            end.format("%H:%M"),
            self.genres.join(", ")
        )
    }

    /// Hash under which the thumbnail for this program is stored, if any.
    pub fn thumbnail_hash(&self) -> Option<&str> {
        self.ogp_url_hash.as_deref()
    }
}

/// Japan Standard Time, the zone broadcast schedules are listed in.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix())
}

/// Lowercase hex SHA-1 of an OGP image URL; thumbnails are keyed by it.
pub fn ogp_hash_for_url(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// True for a 40-digit hex string, the shape of [`ogp_hash_for_url`] output.
pub fn is_ogp_hash(candidate: &str) -> bool {
    candidate.len() == 40 && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}
