//! 감사 로그 레코드 모델
//!
//! 검사 엔진이 JSON 직렬 감사 로그에 한 줄씩 기록하는 엔트리의 형태입니다.
//! 트랜잭션 하나와, 매칭된 룰마다 하나씩의 [`Message`]로 구성됩니다.
//!
//! 모든 필드는 선택적입니다. 누락된 필드는 기본값으로 채워지고
//! 알 수 없는 필드는 무시되므로, 유효한 JSON이기만 하면 라인 전체가
//! 실패하지 않습니다. `null` 값은 해당 필드의 기본값으로 취급하고,
//! 정수 필드는 `i64` 범위 안의 값이면 모두 받습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// 헤더 맵 (헤더 이름 -> 값 목록)
pub type Headers = BTreeMap<String, Vec<String>>;

/// 감사 로그 한 줄에 해당하는 레코드
///
/// `messages`가 비어 있으면 룰 위반이 없었던 트랜잭션입니다.
/// 이런 레코드도 정상적으로 파싱되며 에러로 취급되지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditRecord {
    /// 트랜잭션 정보
    #[serde(deserialize_with = "null_as_default")]
    pub transaction: Transaction,
    /// 매칭된 룰 메시지 목록
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub messages: Vec<Message>,
}

impl AuditRecord {
    /// 룰 위반이 하나 이상 있는지 확인합니다.
    pub fn has_violations(&self) -> bool {
        !self.messages.is_empty()
    }

    /// 매칭된 룰 식별자 목록을 메시지 순서대로 반환합니다.
    pub fn rule_ids(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.data.rule_id()).collect()
    }
}

/// 트랜잭션 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    /// 엔진이 기록한 타임스탬프 문자열
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: String,
    /// Unix 타임스탬프 (엔진 기준 단위)
    #[serde(deserialize_with = "null_as_default")]
    pub unix_timestamp: i64,
    /// 트랜잭션 고유 ID
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// 클라이언트 IP
    #[serde(deserialize_with = "null_as_default")]
    pub client_ip: String,
    /// 클라이언트 포트
    #[serde(deserialize_with = "null_as_default")]
    pub client_port: i64,
    /// 호스트 IP
    #[serde(deserialize_with = "null_as_default")]
    pub host_ip: String,
    /// 호스트 포트
    #[serde(deserialize_with = "null_as_default")]
    pub host_port: i64,
    /// 서버 ID
    #[serde(deserialize_with = "null_as_default")]
    pub server_id: String,
    /// 요청 정보 (감사 로그 파트에 포함된 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<TransactionRequest>,
    /// 응답 정보 (감사 로그 파트에 포함된 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<TransactionResponse>,
}

/// 요청 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionRequest {
    /// HTTP 메서드
    #[serde(deserialize_with = "null_as_default")]
    pub method: String,
    /// 프로토콜 (예: "HTTP/1.1")
    #[serde(deserialize_with = "null_as_default")]
    pub protocol: String,
    /// 요청 URI (origin-form 또는 absolute-form)
    #[serde(deserialize_with = "null_as_default")]
    pub uri: String,
    /// HTTP 버전
    #[serde(deserialize_with = "null_as_default")]
    pub http_version: String,
    /// 요청 헤더
    #[serde(deserialize_with = "null_as_default")]
    pub headers: Headers,
    /// 요청 본문
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
}

/// 상대 URI를 검증할 때 쓰는 자리표시자 기준 URL
const PLACEHOLDER_BASE: &str = "http://relative.invalid/";

impl TransactionRequest {
    /// 요청 URI에서 호스트와 경로를 추출합니다.
    ///
    /// - absolute-form (`http://example.com:8080/a`): 포트를 포함한 호스트와 경로
    /// - origin-form (`/a?b=c`): 빈 호스트와 경로
    /// - opaque (`mailto:x`): 빈 호스트와 빈 경로
    /// - 해석 불가 또는 잘못된 퍼센트 인코딩: `None`
    ///
    /// 경로는 퍼센트 디코딩만 하고 `.`/`..` 세그먼트는 정규화하지 않습니다.
    /// 호스트도 원문 그대로(대소문자, 기본 포트 포함) 유지합니다.
    pub fn host_and_path(&self) -> Option<(String, String)> {
        let uri = self.uri.as_str();
        let has_scheme = match Url::parse(uri) {
            Ok(url) if url.cannot_be_a_base() => return Some((String::new(), String::new())),
            Ok(_) => true,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse(PLACEHOLDER_BASE).ok()?.join(uri).ok()?;
                false
            }
            Err(_) => return None,
        };

        let uri = uri.split_once('#').map_or(uri, |(before, _)| before);
        let uri = uri.split_once('?').map_or(uri, |(before, _)| before);
        let rest = if has_scheme {
            uri.split_once(':').map_or("", |(_, rest)| rest)
        } else {
            uri
        };

        let (authority, path) = match rest.strip_prefix("//") {
            Some(rest) => rest.find('/').map_or((rest, ""), |i| rest.split_at(i)),
            None => ("", rest),
        };
        let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

        Some((host.to_owned(), decode_path(path)?))
    }
}

/// 퍼센트 인코딩된 경로를 디코딩합니다. `%` 뒤에 16진수 두 자리가
/// 오지 않으면 `None`입니다.
fn decode_path(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let well_formed = bytes.iter().enumerate().all(|(i, &b)| {
        b != b'%'
            || bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if !well_formed {
        return None;
    }
    Some(percent_decode_str(path).decode_utf8_lossy().into_owned())
}

/// 응답 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionResponse {
    /// 프로토콜
    #[serde(deserialize_with = "null_as_default")]
    pub protocol: String,
    /// HTTP 상태 코드
    #[serde(deserialize_with = "null_as_default")]
    pub status: i64,
    /// 응답 헤더
    #[serde(deserialize_with = "null_as_default")]
    pub headers: Headers,
    /// 응답 본문
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
}

/// 룰 매칭 메시지
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// 엔진이 생성한 메시지 문자열
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    /// 매칭된 룰 상세
    #[serde(deserialize_with = "null_as_default")]
    pub data: MessageData,
}

/// 매칭된 룰 상세 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageData {
    /// 룰이 정의된 파일
    #[serde(deserialize_with = "null_as_default")]
    pub file: String,
    /// 룰 정의 라인
    #[serde(deserialize_with = "null_as_default")]
    pub line: i64,
    /// 룰 ID
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    /// 룰 리비전
    #[serde(deserialize_with = "null_as_default")]
    pub rev: String,
    /// 사람이 읽는 룰 메시지
    #[serde(deserialize_with = "null_as_default")]
    pub msg: String,
    /// 매칭된 데이터
    #[serde(deserialize_with = "null_as_default")]
    pub data: String,
    /// 심각도
    #[serde(deserialize_with = "null_as_default")]
    pub severity: RuleSeverity,
    /// 룰셋 버전
    #[serde(deserialize_with = "null_as_default")]
    pub ver: String,
    /// 성숙도
    #[serde(deserialize_with = "null_as_default")]
    pub maturity: i64,
    /// 정확도
    #[serde(deserialize_with = "null_as_default")]
    pub accuracy: i64,
    /// 태그
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// 원본 룰 텍스트
    #[serde(deserialize_with = "null_as_default")]
    pub raw: String,
}

impl MessageData {
    /// 메트릭과 로그에 쓰는 룰 식별자 (`<file>-<id>`)
    pub fn rule_id(&self) -> String {
        format!("{}-{}", self.file, self.id)
    }
}

/// 룰 심각도 (syslog 레벨과 같은 0~7 체계)
///
/// 직렬화 시에는 소문자 이름을 쓰고, 역직렬화 시에는 숫자와 이름을 모두 받습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleSeverity {
    /// 0 — 와이어의 기본값(0)과 일치
    #[default]
    Emergency,
    /// 1
    Alert,
    /// 2
    Critical,
    /// 3
    Error,
    /// 4
    Warning,
    /// 5
    Notice,
    /// 6
    Info,
    /// 7
    Debug,
}

impl RuleSeverity {
    /// 숫자 레벨에서 심각도를 만듭니다.
    pub fn from_level(level: u8) -> Option<Self> {
        Some(match level {
            0 => Self::Emergency,
            1 => Self::Alert,
            2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            7 => Self::Debug,
            _ => return None,
        })
    }

    /// 숫자 레벨을 반환합니다.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// 소문자 이름을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emergency" => Ok(Self::Emergency),
            "alert" => Ok(Self::Alert),
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "notice" => Ok(Self::Notice),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown rule severity '{other}'")),
        }
    }
}

impl Serialize for RuleSeverity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RuleSeverity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Level(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Level(level) => Self::from_level(level).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown rule severity level {level}"))
            }),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// `null`을 기본값으로 역직렬화합니다.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_LINE: &str = r#"{"transaction":{"timestamp":"2024/01/15 12:00:00","unix_timestamp":1705320000000000000,"id":"EcNxIrskXYJttXoioLH","client_ip":"10.0.0.5","client_port":51234,"host_ip":"10.0.0.1","host_port":8080,"server_id":"waf-1","request":{"method":"GET","protocol":"HTTP/1.1","uri":"/search?q=%3Cscript%3E","http_version":"1.1","headers":{"host":["example.com"],"accept":["*/*"]},"body":""},"response":{"protocol":"HTTP/1.1","status":403,"headers":{},"body":""}},"messages":[{"message":"XSS Attack Detected via libinjection","data":{"file":"@owasp_crs/REQUEST-941-APPLICATION-ATTACK-XSS.conf","line":5000,"id":941100,"rev":"","msg":"XSS Attack Detected via libinjection","data":"Matched Data: XSS data found within ARGS:q","severity":2,"ver":"OWASP_CRS/4.0.0","maturity":0,"accuracy":0,"tags":["application-multi","attack-xss"],"raw":""}}]}"#;

    #[test]
    fn deserialize_full_record() {
        let record: AuditRecord = serde_json::from_str(FULL_LINE).unwrap();
        assert_eq!(record.transaction.id, "EcNxIrskXYJttXoioLH");
        assert_eq!(record.transaction.client_port, 51234);
        assert_eq!(record.transaction.unix_timestamp, 1_705_320_000_000_000_000);

        let request = record.transaction.request.as_ref().unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.headers["host"], vec!["example.com"]);

        let response = record.transaction.response.as_ref().unwrap();
        assert_eq!(response.status, 403);

        assert_eq!(record.messages.len(), 1);
        let data = &record.messages[0].data;
        assert_eq!(data.id, 941100);
        assert_eq!(data.severity, RuleSeverity::Critical);
        assert_eq!(data.tags, vec!["application-multi", "attack-xss"]);
        assert!(record.has_violations());
    }

    #[test]
    fn record_without_messages_is_valid() {
        let record: AuditRecord =
            serde_json::from_str(r#"{"transaction":{"id":"abc","client_ip":"1.2.3.4"}}"#).unwrap();
        assert_eq!(record.transaction.id, "abc");
        assert!(!record.has_violations());
        assert!(record.transaction.request.is_none());
    }

    #[test]
    fn empty_object_uses_defaults() {
        let record: AuditRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, AuditRecord::default());
    }

    #[test]
    fn null_collections_become_empty() {
        let line = r#"{"transaction":{"id":"n","request":{"method":"POST","headers":null}},"messages":null}"#;
        let record: AuditRecord = serde_json::from_str(line).unwrap();
        assert!(record.messages.is_empty());
        assert!(record.transaction.request.unwrap().headers.is_empty());
    }

    #[test]
    fn null_scalars_and_transaction_become_defaults() {
        let line = r#"{"transaction":{"id":null,"client_port":null,"response":{"status":null}},"messages":[{"message":null,"data":{"id":null,"severity":null,"tags":null}}]}"#;
        let record: AuditRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.transaction.id, "");
        assert_eq!(record.transaction.client_port, 0);
        assert_eq!(record.transaction.response.unwrap().status, 0);
        assert_eq!(record.messages[0].data.severity, RuleSeverity::Emergency);

        let record: AuditRecord = serde_json::from_str(r#"{"transaction":null}"#).unwrap();
        assert_eq!(record.transaction, Transaction::default());
    }

    #[test]
    fn integers_beyond_u16_are_accepted() {
        let line = r#"{"transaction":{"client_port":70000,"host_port":-1,"response":{"status":1000}}}"#;
        let record: AuditRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.transaction.client_port, 70000);
        assert_eq!(record.transaction.host_port, -1);
        assert_eq!(record.transaction.response.unwrap().status, 1000);
    }

    #[test]
    fn wrong_json_type_still_fails() {
        assert!(serde_json::from_str::<AuditRecord>(r#"{"transaction":{"id":5}}"#).is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let line = r#"{"transaction":{"id":"u","new_engine_field":{"nested":true}},"producer":"coraza"}"#;
        let record: AuditRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.transaction.id, "u");
    }

    #[test]
    fn severity_accepts_name_and_level() {
        let by_name: RuleSeverity = serde_json::from_str(r#""WARNING""#).unwrap();
        let by_level: RuleSeverity = serde_json::from_str("4").unwrap();
        assert_eq!(by_name, RuleSeverity::Warning);
        assert_eq!(by_level, RuleSeverity::Warning);
        assert_eq!(serde_json::to_string(&by_level).unwrap(), r#""warning""#);
    }

    #[test]
    fn severity_rejects_unknown_level() {
        assert!(serde_json::from_str::<RuleSeverity>("9").is_err());
        assert!(serde_json::from_str::<RuleSeverity>(r#""fatal""#).is_err());
    }

    #[test]
    fn rule_id_joins_file_and_id() {
        let data = MessageData {
            file: "rules.conf".to_owned(),
            id: 100,
            ..Default::default()
        };
        assert_eq!(data.rule_id(), "rules.conf-100");
    }

    #[test]
    fn host_and_path_origin_form() {
        let request = TransactionRequest {
            uri: "/admin/login?next=%2F".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            request.host_and_path(),
            Some((String::new(), "/admin/login".to_owned()))
        );
    }

    #[test]
    fn host_and_path_absolute_form() {
        let request = TransactionRequest {
            uri: "http://example.com:8080/api/v1?x=1".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            request.host_and_path(),
            Some(("example.com:8080".to_owned(), "/api/v1".to_owned()))
        );
    }

    #[test]
    fn host_and_path_keeps_userinfo_out_of_host() {
        let request = TransactionRequest {
            uri: "https://user:pw@Example.COM/x".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            request.host_and_path(),
            Some(("Example.COM".to_owned(), "/x".to_owned()))
        );
    }

    #[test]
    fn host_and_path_decodes_without_normalizing() {
        let request = TransactionRequest {
            uri: "/files/a%20b/../c%2Fd?q=%20".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            request.host_and_path(),
            Some((String::new(), "/files/a b/../c/d".to_owned()))
        );
    }

    #[test]
    fn host_and_path_rejects_bad_escape() {
        let request = TransactionRequest {
            uri: "/broken%zz".to_owned(),
            ..Default::default()
        };
        assert_eq!(request.host_and_path(), None);
    }

    #[test]
    fn host_and_path_opaque_uri() {
        let request = TransactionRequest {
            uri: "mailto:admin@example.com".to_owned(),
            ..Default::default()
        };
        assert_eq!(request.host_and_path(), Some((String::new(), String::new())));
    }

    #[test]
    fn host_and_path_scheme_relative() {
        let request = TransactionRequest {
            uri: "//cdn.example.org/static/app.js".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            request.host_and_path(),
            Some(("cdn.example.org".to_owned(), "/static/app.js".to_owned()))
        );
    }
}
