//! 号码处理上下文
//!
//! 封装"我正在处理第几个号码"这一信息

use std::fmt::Display;

use crate::models::Item;

/// 号码处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    pub item: Item,
    /// 在批次中的位置（从1开始，仅用于日志显示）
    pub index: usize,
    pub total: usize,
}

impl ItemCtx {
    pub fn new(item: Item, index: usize, total: usize) -> Self {
        Self { item, index, total }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[号码 {}/{} {}]", self.index, self.total, self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefix() {
        let ctx = ItemCtx::new(Item::new("5512345678"), 3, 10);
        assert_eq!(ctx.to_string(), "[号码 3/10 5512345678]");
    }
}
