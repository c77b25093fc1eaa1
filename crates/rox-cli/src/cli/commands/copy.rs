//! `rox copy <src> <dst>`

use anyhow::{Context, Result};
use rox_core::adapters::fs::copy_file_async;
use rox_core::breaker::TargetKey;
use rox_core::executor::Executor;
use rox_core::retry::RetryPolicy;
use std::path::Path;

pub async fn run_copy(executor: &Executor, policy: &RetryPolicy, src: &Path, dst: &Path) -> Result<()> {
    let target = TargetKey::for_path(dst);
    let bytes = executor
        .run(&target, policy, || copy_file_async(src.to_path_buf(), dst.to_path_buf()))
        .await
        .with_context(|| format!("copy {} -> {}", src.display(), dst.display()))?;
    println!("{} bytes  {} -> {}", bytes, src.display(), dst.display());
    Ok(())
}
