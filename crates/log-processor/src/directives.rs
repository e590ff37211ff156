//! 감사 로그 출력 지시문
//!
//! 검사 엔진이 라이브 감사 로그 경로에 JSON 직렬 형식으로 감사 로그를
//! 기록하도록 하는 지시문 블록을 만들고, 엔진 설정 객체에 덧붙입니다.
//! 엔진 쪽으로 향하는 유일한 쓰기 계약입니다.

use std::fmt::Write as _;
use std::path::Path;

/// 감사 로그에 포함할 파트 코드
///
/// A: 헤더, F: 요청 헤더, H: 감사 로그 트레일러, K: 매칭된 룰 목록, Z: 끝 표시
pub const AUDIT_LOG_PARTS: &str = "AFHKZ";

/// 지시문을 받을 수 있는 엔진 설정
///
/// 엔진 설정 빌더는 보통 소비형(`self -> Self`)이므로 같은 형태를 씁니다.
pub trait EngineConfig: Sized {
    /// 지시문 블록(개행으로 구분)을 덧붙인 설정을 반환합니다.
    fn with_directives(self, directives: &str) -> Self;
}

/// 라이브 로그 경로에 대한 감사 로그 지시문 블록을 만듭니다.
pub fn audit_directives(live: &Path) -> String {
    let mut out = String::new();
    // String에 대한 write!는 실패하지 않는다
    let _ = writeln!(out, "SecAuditLog {}", live.display());
    let _ = writeln!(out, "SecAuditLogParts {AUDIT_LOG_PARTS}");
    out.push_str("SecAuditLogFormat JSON\n");
    out.push_str("SecAuditLogType Serial\n");
    out.push_str("SecAuditEngine On\n");
    out
}

/// 지시문을 순서대로 모으는 단순한 [`EngineConfig`] 구현
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    lines: Vec<String>,
}

impl DirectiveSet {
    /// 빈 지시문 집합을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지시문 라인 목록을 반환합니다.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 이름으로 시작하는 첫 지시문의 인자를 반환합니다.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            let (directive, args) = line.split_once(char::is_whitespace)?;
            (directive == name).then(|| args.trim())
        })
    }

    /// 엔진에 넘길 지시문 텍스트를 반환합니다.
    pub fn to_directives_string(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

impl EngineConfig for DirectiveSet {
    fn with_directives(mut self, directives: &str) -> Self {
        self.lines.extend(
            directives
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_owned),
        );
        self
    }
}
