//! 세션 통계
//!
//! 한 클라이언트 세션이 단독 소유하며 검증된 왕복 이후에만 갱신된다.
//! 동시 기록자는 없다.

use std::time::Duration;

/// 세션 왕복 통계
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// 전송 시도한 메시지 수
    pub sent: u64,

    /// 검증된 응답을 받은 메시지 수
    pub received: u64,

    /// 검증된 왕복 시간 누계
    pub total_rtt: Duration,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 메시지 전송 시작 기록
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    /// 검증된 왕복 기록
    pub fn record_round_trip(&mut self, rtt: Duration) {
        self.received += 1;
        self.total_rtt += rtt;
    }

    /// 성공률 (%)
    pub fn success_rate(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.received as f64 / self.sent as f64 * 100.0
    }

    /// 평균 왕복 시간
    pub fn average_rtt(&self) -> Option<Duration> {
        if self.received == 0 {
            return None;
        }
        Some(self.total_rtt / self.received as u32)
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        let avg_ms = self
            .average_rtt()
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        format!(
            "Sent: {} | Received: {} | Success: {:.1}% | Avg RTT: {:.1}ms",
            self.sent,
            self.received,
            self.success_rate(),
            avg_ms,
        )
    }
}
