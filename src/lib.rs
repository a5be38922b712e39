pub mod device;
pub mod error;
pub mod events;
pub mod pairing;
pub mod protocol;
pub mod sync;

pub use error::{AppError, AppResult};
pub use events::SyncUiEvent;
pub use pairing::{ChainStatus, PairingEvent, PairingSnapshot, PairingState};
pub use protocol::{ChannelSyncEngine, EngineCommand, EngineNotification, SyncEngine};
pub use sync::SyncManager;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志，`RUST_LOG` 未设置时默认输出本 crate 的 debug 日志
///
/// 重复调用时忽略（测试或宿主程序可能已经安装了 subscriber）。
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chainsync=debug")))
        .try_init();
}
