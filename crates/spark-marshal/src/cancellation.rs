use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 随编解码调用一起传递的取消信号。
///
/// 注册表只在两处读取它：编码侧找不到写入适配器时，以及解码侧在已停止的表中找不到读索引时。
/// 信号已置位的调用方得到 [`MarshalError::ShuttingDown`](crate::MarshalError::ShuttingDown)，
/// 其余调用方得到普通的查找失败。克隆与 [`child`](Self::child) 共享同一标记，
/// 因此停机线程置位一次即可让所有解码工作线程观察到。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    stopping: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// 置位取消标记；仅当本次调用完成置位时返回 `true`。
    pub fn cancel(&self) -> bool {
        !self.stopping.swap(true, Ordering::AcqRel)
    }

    /// 交给解码工作线程的句柄，与当前令牌观察同一标记。
    pub fn child(&self) -> Self {
        self.clone()
    }
}
