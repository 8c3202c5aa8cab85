use std::sync::Arc;
use std::time::Duration;

use minitrack_sdk::{
    InMemoryRemoteStore, MemoryLocalStore, MiniTrackConfig, MiniTrackSdk, Note, NoopNotifier,
    Transaction, TransactionKind,
};
use chrono::NaiveDate;

/// 端到端演示：初始化 → 写入 → 推送 → 拉回 → 导出
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🚀 MiniTrack SDK 演示");
    println!("==============================\n");

    // 示例1：SDK 初始化和配置
    println!("📋 示例1: SDK 初始化和配置");
    let config = MiniTrackConfig::builder()
        .debounce_window(Duration::from_secs(2))
        .debug_mode(true)
        .build();

    // 演示用内存存储；真实宿主注入 sled 本地存储与云端桥接实现
    let remote = Arc::new(InMemoryRemoteStore::new());
    let sdk = MiniTrackSdk::initialize_with(
        config,
        remote,
        Arc::new(MemoryLocalStore::new()),
        Arc::new(NoopNotifier),
    )?;
    println!("✅ SDK 初始化完成\n");

    // 示例2：写入域数据（本地立即生效）
    println!("📋 示例2: 写入笔记与交易");
    sdk.notes().add(Note::new("购物清单", "牛奶、面包", "生活"))?;
    sdk.finances().add(Transaction::new(
        "Coffee",
        150.0,
        TransactionKind::Expense,
        "Food",
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
    ))?;
    println!(
        "✅ 本地数据: {} 条笔记, 余额 {:.2}\n",
        sdk.notes().count(),
        sdk.finances().balance()
    );

    // 示例3：手动推送（绕过防抖窗口）
    println!("📋 示例3: 推送到云端");
    let report = sdk.push_now().await?;
    println!("✅ 推送结果: {:?}", report.outcome);
    for (collection, status) in &report.statuses {
        println!("   - {}: {} 条", collection, status.count.unwrap_or(0));
    }
    println!();

    // 示例4：新会话拉取
    println!("📋 示例4: 模拟新会话拉取");
    sdk.sync().reset_session_guard();
    let report = sdk.pull().await?;
    println!("✅ 拉取结果: {:?}\n", report.outcome);

    // 示例5：导出备份
    println!("📋 示例5: 导出备份文档");
    let backup = sdk.export_to_string()?;
    println!("✅ 备份大小: {} 字节", backup.len());
    println!("   建议文件名: {}\n", minitrack_sdk::backup_filename());

    sdk.shutdown().await;
    println!("👋 演示结束");
    Ok(())
}
