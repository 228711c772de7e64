//! 软断言
//!
//! 记录失败的期望但不中断检查，检查结束后统一转换为结果。

use std::fmt::Debug;

use tracing::warn;

use crate::report::CheckStatus;

/// 软断言收集器
#[derive(Debug, Default)]
pub struct SoftAssert {
    failures: Vec<String>,
}

impl SoftAssert {
    pub fn new() -> Self {
        Self::default()
    }

    /// 条件不成立时记录失败，返回条件本身
    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> bool {
        if !condition {
            self.fail(message);
        }
        condition
    }

    /// 比较两个值
    pub fn eq<T: PartialEq + Debug>(&mut self, left: T, right: T, what: &str) -> bool {
        let equal = left == right;
        if !equal {
            self.fail(format!("{}: {:?} != {:?}", what, left, right));
        }
        equal
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("断言失败: {}", message);
        self.failures.push(message);
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// 无失败为通过，否则所有失败信息合并为一条
    pub fn into_status(self) -> CheckStatus {
        if self.failures.is_empty() {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed(self.failures.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_without_aborting() {
        let mut sa = SoftAssert::new();
        assert!(sa.check(true, "never recorded"));
        assert!(!sa.check(false, "first"));
        assert!(!sa.eq(1, 2, "subcount"));
        assert_eq!(sa.failures().len(), 2);

        match sa.into_status() {
            CheckStatus::Failed(msg) => {
                assert!(msg.contains("first"));
                assert!(msg.contains("subcount: 1 != 2"));
            }
            other => panic!("应为失败: {:?}", other),
        }
    }

    #[test]
    fn test_clean_is_passed() {
        assert_eq!(SoftAssert::new().into_status(), CheckStatus::Passed);
    }
}
