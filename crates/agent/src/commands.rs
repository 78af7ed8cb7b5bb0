use anyhow::Result;

use crate::api_client::ApiClient;
use crate::cli::OutputFormat;

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

pub async fn cmd_status(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let body = client.get_json("/status").await?;
    match output {
        OutputFormat::Json => print_json(&body),
        OutputFormat::Table => {
            println!("instance:   {}", body["instance_id"].as_str().unwrap_or("?"));
            println!("version:    {}", body["version"].as_str().unwrap_or("?"));
            println!("uptime:     {}s", body["uptime_secs"]);
            println!(
                "workers:    {} ({} busy, {} in flight)",
                body["workers"]["pool_size"],
                body["workers"]["busy"],
                body["workers"]["in_flight"]
            );
            println!(
                "domains:    {} total, {} priority",
                body["domains"]["total"], body["domains"]["priority"]
            );
            if let Some(by_verdict) = body["domains"]["by_verdict"].as_object() {
                for (verdict, count) in by_verdict {
                    println!("  {verdict:<22} {count}");
                }
            }
        }
    }
    Ok(())
}

pub async fn cmd_health(client: &ApiClient, output: OutputFormat) -> Result<()> {
    match client.get_json("/health").await {
        Ok(body) => {
            match output {
                OutputFormat::Json => print_json(&body),
                OutputFormat::Table => {
                    println!("health: {}", body["status"].as_str().unwrap_or("?"));
                }
            }
            Ok(())
        }
        Err(e) => {
            println!("health: unreachable");
            Err(e)
        }
    }
}

pub async fn cmd_domains(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let body = client.get_json("/domains").await?;
    match output {
        OutputFormat::Json => print_json(&body),
        OutputFormat::Table => {
            let Some(domains) = body.as_array() else {
                print_json(&body);
                return Ok(());
            };
            println!(
                "{:<40} {:<8} {:<22} {:<6} next check",
                "domain", "priority", "verdict", "conf"
            );
            for d in domains {
                println!(
                    "{:<40} {:<8} {:<22} {:<6.2} {}",
                    d["domain"].as_str().unwrap_or("?"),
                    if d["priority"].as_bool().unwrap_or(false) {
                        "high"
                    } else {
                        "normal"
                    },
                    d["last_verdict"].as_str().unwrap_or("?"),
                    d["last_confidence"].as_f64().unwrap_or(0.0),
                    d["next_check_at"].as_str().unwrap_or("?"),
                );
            }
        }
    }
    Ok(())
}

pub async fn cmd_domain(client: &ApiClient, name: &str, output: OutputFormat) -> Result<()> {
    let body = client.get_json(&format!("/domain/{name}")).await?;
    match output {
        OutputFormat::Json => print_json(&body),
        OutputFormat::Table => {
            println!("domain:              {}", body["domain"].as_str().unwrap_or("?"));
            println!("priority:            {}", body["priority"]);
            println!(
                "verdict:             {} (confidence {:.2})",
                body["last_verdict"].as_str().unwrap_or("?"),
                body["last_confidence"].as_f64().unwrap_or(0.0)
            );
            println!(
                "reported:            {}",
                body["last_reported_status"].as_str().unwrap_or("never")
            );
            println!(
                "last checked:        {}",
                body["last_checked_at"].as_str().unwrap_or("never")
            );
            println!("next check:          {}", body["next_check_at"].as_str().unwrap_or("?"));
            println!("consecutive errors:  {}", body["consecutive_failures"]);
            println!("in flight:           {}", body["in_flight"]);
        }
    }
    Ok(())
}

pub async fn cmd_metrics(client: &ApiClient, filter: Option<&str>) -> Result<()> {
    let path = match filter {
        Some(filter) => format!("/metrics?filter={filter}"),
        None => "/metrics".to_string(),
    };
    print!("{}", client.get_text(&path).await?);
    Ok(())
}

pub async fn cmd_refresh(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let body = client.post_json("/refresh").await?;
    match output {
        OutputFormat::Json => print_json(&body),
        OutputFormat::Table => {
            println!("refresh: {}", body["status"].as_str().unwrap_or("?"));
        }
    }
    Ok(())
}
