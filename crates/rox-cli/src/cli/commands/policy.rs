//! `rox policy` – show effective retry policies and breaker settings.

use anyhow::Result;
use rox_core::config::EffectivePolicies;
use rox_core::retry::RetryPolicy;

fn codes(set: &std::collections::HashSet<String>) -> String {
    if set.is_empty() {
        return "-".to_string();
    }
    let mut v: Vec<&str> = set.iter().map(String::as_str).collect();
    v.sort_unstable();
    v.join(",")
}

fn print_policy(name: &str, p: &RetryPolicy) {
    println!(
        "{:<8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}  {:<24} {}",
        name,
        p.max_attempts(),
        p.base_delay_ms(),
        p.step_ms(),
        p.max_delay_ms(),
        p.jitter_ms(),
        p.worst_case_suspension().as_millis(),
        codes(p.retryable_codes()),
        codes(p.non_retryable_codes()),
    );
}

pub fn run_policy(policies: &EffectivePolicies) -> Result<()> {
    println!(
        "{:<8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}  {:<24} {}",
        "POLICY", "ATTEMPTS", "BASE", "STEP", "MAX", "JITTER", "WORST(ms)", "RETRY", "NEVER-RETRY"
    );
    print_policy("file", &policies.file);
    print_policy("network", &policies.network);
    print_policy("cache", &policies.cache);
    println!();
    println!(
        "breaker: open after {} consecutive failures, cooldown {} ms",
        policies.breaker.failure_threshold,
        policies.breaker.cooldown.as_millis()
    );
    Ok(())
}
