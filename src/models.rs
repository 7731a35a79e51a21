use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const SCHEDULE_CACHE_KEY: &str = "schedule_cache";
pub const REQUEST_COUNTER_KEY: &str = "schedule_request_counter";
pub const AUTH_TOKENS_KEY: &str = "auth_tokens";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonType {
    Lecture,
    Practice,
    Lab,
    Exam,
    MilitaryDept,
    Other(i32),
}

impl LessonType {
    pub fn code(self) -> i32 {
        match self {
            LessonType::Lecture => 2,
            LessonType::Practice => 4,
            LessonType::Lab => 8,
            LessonType::Exam => 256,
            LessonType::MilitaryDept => 4096,
            LessonType::Other(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LessonType::Lecture => "Lecture",
            LessonType::Practice => "Practice",
            LessonType::Lab => "Lab",
            LessonType::Exam => "Exam",
            LessonType::MilitaryDept => "Military dept.",
            LessonType::Other(_) => "",
        }
    }
}

impl From<i32> for LessonType {
    fn from(code: i32) -> Self {
        match code {
            2 => LessonType::Lecture,
            4 => LessonType::Practice,
            8 => LessonType::Lab,
            256 => LessonType::Exam,
            4096 => LessonType::MilitaryDept,
            other => LessonType::Other(other),
        }
    }
}

impl Default for LessonType {
    fn default() -> Self {
        LessonType::Other(0)
    }
}

impl Serialize for LessonType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for LessonType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer).map(LessonType::from)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lesson {
    pub number: i32,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub time_range: String,
    pub parity: i32,
    pub lesson_name: String,
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    pub is_stream: bool,
    pub duration: i32,
    pub duration_minutes: i32,
    pub is_division: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auditory_name: Option<String>,
    pub is_distant: bool,
    pub is_short: bool,
    pub is_lecture: bool,
}

impl Lesson {
    /// Start of `timeRange` ("HH:MM"), or `None` for an all-day entry.
    pub fn start_time(&self) -> Option<&str> {
        let range = self.time_range.trim();
        if range.is_empty() {
            return None;
        }
        range.split('-').next().map(str::trim)
    }

    pub fn end_time(&self) -> Option<&str> {
        if self.time_range.trim().is_empty() {
            return None;
        }
        self.time_range.split('-').nth(1).map(str::trim)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayInfo {
    #[serde(rename = "type", default)]
    pub day_type: i32,
    pub week_number: i32,
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub info: DayInfo,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl ScheduleDay {
    pub fn date(&self) -> NaiveDate {
        self.info.date
    }

    pub fn week_number(&self) -> i32 {
        self.info.week_number
    }
}

/// One week of the `/schedule/group` payload; only its days are used.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleItem {
    #[serde(default)]
    pub days: Vec<ScheduleDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleResponse {
    pub items: Vec<ScheduleItem>,
}

impl ScheduleResponse {
    pub fn into_days(self) -> Vec<ScheduleDay> {
        self.items.into_iter().flat_map(|item| item.days).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSchedule {
    pub timestamp: i64,
    pub data: Vec<ScheduleDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounter {
    pub count: u32,
    pub timestamp: i64,
}

impl RequestCounter {
    pub fn fresh(now_ms: i64) -> Self {
        Self {
            count: 0,
            timestamp: now_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    #[serde(default)]
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_refresh_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
}

impl AuthTokens {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.issued_at {
            Some(issued_at) => now_ms - issued_at > self.expires_in * 1000,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub group_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfo {
    pub auth: i32,
    pub user: Option<UserInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckResponse {
    pub auth_info: Option<AuthInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    #[serde(default)]
    pub in_diplom: i32,
    pub mark_name: Option<String>,
    #[serde(default)]
    pub mark: i32,
    pub semester: i32,
    #[serde(default)]
    pub control_type_name: String,
    #[serde(default)]
    pub years: String,
    #[serde(default)]
    pub course: i32,
    #[serde(default)]
    pub lesson_name: String,
    #[serde(default)]
    pub credit_unit: f64,
    #[serde(default)]
    pub has_debt: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Department {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupsResponse {
    pub items: Vec<Department>,
}

/// Schedule dates arrive either as `YYYY-MM-DD` or as a full ISO timestamp;
/// only the calendar date prefix is significant.
mod calendar_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let prefix = raw.get(..10).unwrap_or(&raw);
        NaiveDate::parse_from_str(prefix, FORMAT)
            .map_err(|e| de::Error::custom(format!("invalid schedule date {raw:?}: {e}")))
    }
}
