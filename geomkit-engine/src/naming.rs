//! 派生实体的命名。
//!
//! 构造与计算产生的点、圆需要进程内唯一的名称。名称来源可注入，
//! 默认使用单调递增计数器，保证测试可复现。

use std::fmt;

pub trait NameGenerator: fmt::Debug + Send {
    /// 基于前缀生成候选名称。调用方负责检查与已有实体的冲突。
    fn next_name(&mut self, prefix: &str) -> String;
}

/// `{prefix}_{n}`，n 从 1 开始单调递增，所有前缀共享同一计数器。
#[derive(Debug, Default, Clone)]
pub struct SequentialNames {
    counter: u64,
}

impl SequentialNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从指定值之后开始计数，用于恢复会话时避开已用编号。
    pub fn starting_after(counter: u64) -> Self {
        Self { counter }
    }
}

impl NameGenerator for SequentialNames {
    fn next_name(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}_{}", self.counter)
    }
}

/// 由调用方提供的名称来源。
pub struct NameSupplier<F> {
    supplier: F,
}

impl<F> NameSupplier<F>
where
    F: FnMut(&str) -> String + Send,
{
    pub fn new(supplier: F) -> Self {
        Self { supplier }
    }
}

impl<F> fmt::Debug for NameSupplier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameSupplier").finish_non_exhaustive()
    }
}

impl<F> NameGenerator for NameSupplier<F>
where
    F: FnMut(&str) -> String + Send,
{
    fn next_name(&mut self, prefix: &str) -> String {
        (self.supplier)(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_names_are_monotonic() {
        let mut names = SequentialNames::new();
        assert_eq!(names.next_name("perp_end"), "perp_end_1");
        assert_eq!(names.next_name("mid_AB"), "mid_AB_2");
        assert_eq!(names.next_name("perp_end"), "perp_end_3");

        let mut resumed = SequentialNames::starting_after(41);
        assert_eq!(resumed.next_name("circle"), "circle_42");
    }

    #[test]
    fn supplier_delegates_to_closure() {
        let mut calls = 0;
        let mut names = NameSupplier::new(move |prefix: &str| {
            calls += 1;
            format!("{prefix}-{calls}")
        });
        assert_eq!(names.next_name("x"), "x-1");
        assert_eq!(names.next_name("y"), "y-2");
    }
}
