//! Hybrid heuristic/LLM reasoning-tier classification.
//!
//! Hard override rules always win: a prompt meeting one resolves to `high`
//! no matter what the heuristic ladder or the external router says.

use anyhow::Result;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::models::ReasoningTier;
use crate::reasoning::router::TierRouter;

const VERY_LONG_CHARS: usize = 800;
const LONG_CHARS: usize = 400;
const LONG_TOKEN_ESTIMATE: usize = 100;
const VERY_LONG_ATTACHMENTS: usize = 3;

pub struct TierClassifier {
    length_threshold: usize,
    code_re: Regex,
    doc_extension_re: Regex,
    risk_re: Regex,
    math_re: Regex,
    multi_step_re: Regex,
}

impl TierClassifier {
    pub fn new(length_threshold: usize) -> Result<Self> {
        Ok(Self {
            length_threshold,
            code_re: Regex::new(
                r"(?is)```|\bselect\s+.{1,80}\s+from\b|<script\b|\bregex\b|\b(?:fn|def|class|import|function|struct|impl|lambda)\s+\w+",
            )?,
            doc_extension_re: Regex::new(r"(?i)\b[\w\-]+\.(?:pdf|docx?|pptx)\b")?,
            risk_re: Regex::new(
                r"(?i)hợp đồng|pháp lý|pháp luật|tòa án|khởi kiện|nghị định|thông tư|thuế|tài chính|đầu tư|chứng khoán|y tế|chẩn đoán|điều trị|bệnh án|legal|lawsuit|contract|regulat|compliance|financial|invest|tax|medical|diagnos",
            )?,
            math_re: Regex::new(r"(?i)\d+\s*[-+*/^=%]\s*\d+|tính toán|phương trình|calculate|equation")?,
            multi_step_re: Regex::new(r"(?im)^\s*(?:\d+[.)]|bước \d+|step \d+)\s+\S")?,
        })
    }

    /// Rules that force `high` regardless of every other signal.
    pub fn hard_override(&self, prompt: &str) -> bool {
        if prompt.chars().count() >= self.length_threshold {
            return true;
        }
        self.code_re.is_match(prompt) || self.doc_extension_re.is_match(prompt)
    }

    /// The heuristic ladder, evaluated only when no hard rule fired.
    pub fn classify_heuristic(&self, prompt: &str, attachments: usize) -> ReasoningTier {
        let chars = prompt.chars().count();
        let token_estimate = chars / 4;

        if self.risk_re.is_match(prompt) {
            return ReasoningTier::High;
        }
        if chars >= VERY_LONG_CHARS || attachments >= VERY_LONG_ATTACHMENTS {
            return ReasoningTier::High;
        }
        if chars >= LONG_CHARS || token_estimate >= LONG_TOKEN_ESTIMATE || attachments >= 1 {
            if self.math_re.is_match(prompt) || self.multi_step_re.is_match(prompt) {
                return ReasoningTier::High;
            }
            return ReasoningTier::Medium;
        }
        if self.math_re.is_match(prompt) {
            return ReasoningTier::Medium;
        }
        ReasoningTier::Low
    }

    /// Resolve the tier for a prompt. The router, when provided and
    /// reachable, proposes a tier first; the heuristic acts as a floor, so
    /// the router can only raise the answer, never lower it. Router failure
    /// silently falls back to the heuristic alone.
    pub fn resolve(
        &self,
        prompt: &str,
        attachments: usize,
        router: Option<&dyn TierRouter>,
    ) -> ReasoningTier {
        if self.hard_override(prompt) {
            debug!("Hard override matched, tier forced to high");
            return ReasoningTier::High;
        }

        let heuristic = self.classify_heuristic(prompt, attachments);
        match router {
            Some(router) => match router.route(prompt, &self.router_system_prompt()) {
                Ok(routed) => {
                    debug!(
                        "Router proposed {}, heuristic floor {}",
                        routed.as_str(),
                        heuristic.as_str()
                    );
                    routed.max(heuristic)
                }
                Err(err) => {
                    let err = ExtractError::RouterUnavailable {
                        details: err.to_string(),
                    };
                    warn!("{}, using heuristic", err);
                    heuristic
                }
            },
            None => heuristic,
        }
    }

    /// System prompt handed to the external router so its judgment is aware
    /// of the same hard rules.
    pub fn router_system_prompt(&self) -> String {
        format!(
            "You are a routing assistant. Classify the reasoning effort needed for the \
             user's request as exactly one word: low, medium, or high. \
             Always answer high when the request involves code, SQL, regular expressions, \
             document files, or exceeds {} characters. Answer with the single word only.",
            self.length_threshold
        )
    }
}

/// Per-tier system-prompt framing for the answering model.
pub fn system_prompt_for(tier: ReasoningTier) -> &'static str {
    match tier {
        ReasoningTier::Low => {
            "Trả lời ngắn gọn, trực tiếp. Không cần phân tích sâu."
        }
        ReasoningTier::Medium => {
            "Phân tích yêu cầu trước khi trả lời. Trình bày các bước chính một cách rõ ràng."
        }
        ReasoningTier::High => {
            "Phân tích kỹ lưỡng từng khía cạnh của yêu cầu. Kiểm tra lại lập luận và kết quả \
             trước khi đưa ra câu trả lời cuối cùng."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TierClassifier {
        TierClassifier::new(1000).unwrap()
    }

    #[test]
    fn test_code_fence_forces_high() {
        let c = classifier();
        assert!(c.hard_override("sửa giúp tôi đoạn này ```rust\nfn main() {}\n```"));
        assert!(c.hard_override("viết câu SELECT name FROM users cho tôi"));
        assert!(c.hard_override("cần một regex để tách số điện thoại"));
        assert!(c.hard_override("trang có <script src=\"x.js\"></script>"));
    }

    #[test]
    fn test_document_extension_forces_high() {
        let c = classifier();
        assert!(c.hard_override("tóm tắt giúp tôi file bao-cao.pdf"));
        assert!(c.hard_override("mở quyet-dinh.docx và kiểm tra"));
        assert!(!c.hard_override("tôi cần trình bày một bản báo cáo"));
    }

    #[test]
    fn test_length_threshold_forces_high() {
        let c = classifier();
        let long_prompt = "xin chào ".repeat(150);
        assert!(long_prompt.chars().count() >= 1000);
        assert!(c.hard_override(&long_prompt));
        assert_eq!(c.resolve(&long_prompt, 0, None), ReasoningTier::High);
    }

    #[test]
    fn test_short_greeting_is_low() {
        let c = classifier();
        assert!(!c.hard_override("xin chào"));
        assert_eq!(c.resolve("xin chào", 0, None), ReasoningTier::Low);
    }

    #[test]
    fn test_risk_domain_is_high() {
        let c = classifier();
        assert_eq!(
            c.classify_heuristic("điều khoản hợp đồng này có bất lợi không", 0),
            ReasoningTier::High
        );
        assert_eq!(
            c.classify_heuristic("mức thuế thu nhập cá nhân hiện nay", 0),
            ReasoningTier::High
        );
    }

    #[test]
    fn test_attachment_counts_raise_tier() {
        let c = classifier();
        assert_eq!(c.classify_heuristic("xem giúp tôi", 1), ReasoningTier::Medium);
        assert_eq!(c.classify_heuristic("xem giúp tôi", 3), ReasoningTier::High);
    }

    #[test]
    fn test_long_prompt_with_math_upgrades_to_high() {
        let c = classifier();
        let prompt = format!("{} rồi tính 25 * 48 cho tôi", "nội dung kéo dài ".repeat(30));
        assert!(prompt.chars().count() >= LONG_CHARS);
        assert!(prompt.chars().count() < VERY_LONG_CHARS);
        assert_eq!(c.classify_heuristic(&prompt, 0), ReasoningTier::High);
    }

    #[test]
    fn test_light_math_is_medium() {
        let c = classifier();
        assert_eq!(c.classify_heuristic("3 + 4 bằng mấy", 0), ReasoningTier::Medium);
    }

    struct FixedRouter(ReasoningTier);
    impl TierRouter for FixedRouter {
        fn route(&self, _prompt: &str, _system: &str) -> Result<ReasoningTier> {
            Ok(self.0)
        }
    }

    struct FailingRouter;
    impl TierRouter for FailingRouter {
        fn route(&self, _prompt: &str, _system: &str) -> Result<ReasoningTier> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn test_heuristic_floors_the_router() {
        let c = classifier();
        // Risk-domain prompt: heuristic says high, router says low
        let tier = c.resolve(
            "điều khoản hợp đồng này có rủi ro pháp lý không",
            0,
            Some(&FixedRouter(ReasoningTier::Low)),
        );
        assert_eq!(tier, ReasoningTier::High);
    }

    #[test]
    fn test_router_can_raise_above_heuristic() {
        let c = classifier();
        let tier = c.resolve("xin chào", 0, Some(&FixedRouter(ReasoningTier::Medium)));
        assert_eq!(tier, ReasoningTier::Medium);
    }

    #[test]
    fn test_router_failure_falls_back_to_heuristic() {
        let c = classifier();
        assert_eq!(c.resolve("xin chào", 0, Some(&FailingRouter)), ReasoningTier::Low);
        assert_eq!(
            c.resolve("mức thuế hiện hành ra sao", 0, Some(&FailingRouter)),
            ReasoningTier::High
        );
    }
}
