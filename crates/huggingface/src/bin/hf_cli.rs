use anyhow::{Context, Result};
use assistant_core::config::AppConfig;
use clap::{Parser, Subcommand};
use huggingface::models::DetectedObject;
use huggingface::{HuggingFaceClient, OBJECT_DETECTION_MODEL};
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hf-cli", about = "独立的 Hugging Face Inference API 测试工具", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 目标检测（facebook/detr-resnet-50），按标签汇总结果
    Detect {
        /// 图片路径或 URL
        #[arg(long, short = 'd')]
        data_path: String,
        /// 直接输出原始响应
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// 图片描述
    Caption {
        /// 图片路径或 URL
        #[arg(long, short = 'd')]
        data_path: String,
    },
    /// 向任意模型发送原始请求
    Post {
        /// 模型 ID，例如 facebook/detr-resnet-50
        #[arg(long, short = 'm')]
        model: String,
        /// 图片路径或 URL
        #[arg(long, short = 'd')]
        data_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = AppConfig::load_from_env()?;
    let client = HuggingFaceClient::from_config(&config)?;

    match cli.command {
        Command::Detect { data_path, raw } => {
            let body = client.post(&data_path, OBJECT_DETECTION_MODEL).await?;
            if raw {
                println!("{}", body);
                return Ok(());
            }

            let objects: Vec<DetectedObject> =
                serde_json::from_str(&body).context("目标检测结果不是合法的 JSON")?;
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for object in &objects {
                *counts.entry(object.label.as_str()).or_default() += 1;
            }

            println!("Detected {} objects:", objects.len());
            for (label, count) in counts {
                println!("  {label}: {count}");
            }
        }
        Command::Caption { data_path } => {
            let caption = client.image_to_text(&data_path).await?;
            println!("{}", caption);
        }
        Command::Post { model, data_path } => {
            let body = client.post(&data_path, &model).await?;
            println!("{}", body);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        // tracing already initialised; ignore.
    }
    Ok(())
}
