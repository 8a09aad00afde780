//! # 缓冲池模块
//!
//! 渲染管线在把页面写入网络之前，会先把输出暂存到一个可复用的字节缓冲区中。
//! 该模块提供一个容量受限的缓冲池，避免每个请求都重新分配内存。
//!
//! 借出的缓冲区由 [`PooledBuffer`] 守卫持有，守卫在离开作用域时自动归还，
//! 无论渲染成功还是中途失败。归还前缓冲区一定会被清空，
//! 后一个借用者不可能观察到前一个请求的数据。

use log::warn;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// 容量受限的字节缓冲池。
///
/// 借出/归还操作由内部互斥锁串行化，同一个缓冲区在归还之前
/// 不会对其他请求可见。注册表构建完成后整个池子通过 `Arc` 共享。
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    // 根据容量构造
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        if capacity == 0 {
            panic!("调用with_capacity时指定的大小是0。如果需要自动设置大小，请在调用处进行处理，而不是传入0");
        }
        Arc::new(Self {
            buffers: Mutex::new(Vec::new()),
            capacity,
        })
    }

    /// 借出一个空缓冲区。池中没有空闲缓冲区时现场分配一个新的。
    pub fn get(self: &Arc<Self>) -> PooledBuffer {
        let mut lock = match self.buffers.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓冲池锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        let buf = lock.pop().unwrap_or_default();
        PooledBuffer {
            pool: Arc::clone(self),
            buf,
        }
    }

    /// 当前空闲（未被借出）的缓冲区数量
    pub fn idle(&self) -> usize {
        match self.buffers.lock() {
            Ok(lock) => lock.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    // 归还。只在守卫的Drop里调用。
    fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut lock = match self.buffers.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓冲池锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        // 池子已满就直接丢弃，让分配器回收
        if lock.len() < self.capacity {
            lock.push(buf);
        }
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// 从池中借出的缓冲区守卫。
///
/// 实现了 `Write`，模板执行和 JSON 序列化都直接写入它。
/// Drop 时自动清空并归还，保证每次借出恰好归还一次。
pub struct PooledBuffer {
    pool: Arc<BufferPool>,
    buf: Vec<u8>,
}

impl PooledBuffer {
    /// 已写入内容的只读视图
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// 已写入的字节数
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Write for PooledBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.put(buf);
    }
}
