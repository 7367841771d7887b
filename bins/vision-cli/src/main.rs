use anyhow::{Context, Result};
use assistant_core::config::AppConfig;
use clap::{Parser, Subcommand};
use function_calling::{FunctionCallingGpt, FunctionRegistry, DEFAULT_MODEL};
use huggingface::HuggingFaceClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "vision-cli",
    about = "让 GPT 通过 Function Call 调用 Hugging Face 视觉模型",
    version
)]
struct Cli {
    /// 输出密钥前缀、完整对话与函数结果
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 对示例图片依次提问：数一数物体、描述图片
    Demo {
        /// 图片路径，默认 ./image/savanna.jpg
        #[arg(long, short = 'i')]
        image: Option<PathBuf>,
        /// 模型名称
        #[arg(long, short = 'm', default_value = DEFAULT_MODEL)]
        model: String,
    },
    /// 发送一条问题，直到模型给出最终回答
    Ask {
        /// 用户问题，可在其中写入 data_path
        #[arg(long, short = 'p')]
        prompt: String,
        /// 模型名称
        #[arg(long, short = 'm', default_value = DEFAULT_MODEL)]
        model: String,
        /// 以 JSON 输出完整对话记录
        #[arg(long, default_value_t = false)]
        transcript: bool,
        /// 最大对话轮数（默认不限制）
        #[arg(long)]
        max_turns: Option<usize>,
    },
    /// 不经过模型，直接调用函数
    Dispatch {
        /// 函数名称，例如 object_detection
        #[arg(long, short = 'f')]
        function: String,
        /// 参数（JSON 字符串），例如 '{"data_path":"image/savanna.jpg"}'
        #[arg(long, short = 'a', default_value = "null")]
        arguments: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Demo { image, model } => {
            let gpt = FunctionCallingGpt::from_env(model, cli.verbose)?;
            let image = match image {
                Some(path) => path,
                None => std::env::current_dir()
                    .context("无法确定当前工作目录")?
                    .join("image")
                    .join("savanna.jpg"),
            };
            let data_path = image.display().to_string();

            for question in [
                "Can you count how many objects in this picture? data_path: ",
                "Can you describe this picture? data_path: ",
            ] {
                let user_content = format!("{question}{data_path}");
                info!(user_content = %user_content, "Asking demo question");
                let answer = gpt.answer(&user_content).await?;
                println!("answer = {:?}", answer);
                println!();
            }
        }
        Command::Ask {
            prompt,
            model,
            transcript,
            max_turns,
        } => {
            let mut gpt = FunctionCallingGpt::from_env(model, cli.verbose)?;
            if let Some(max_turns) = max_turns {
                gpt = gpt.with_max_turns(max_turns);
            }

            let outcome = gpt.run(&prompt).await?;
            if transcript {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.answer);
            }
        }
        Command::Dispatch {
            function,
            arguments,
        } => {
            let config = AppConfig::load_from_env()?;
            let client = HuggingFaceClient::from_config(&config)?;
            let registry = FunctionRegistry::with_inference_backend(Arc::new(client));

            let arguments: serde_json::Value = serde_json::from_str(&arguments)
                .with_context(|| format!("arguments 字段不是合法的 JSON: {}", arguments))?;
            let arguments = (!arguments.is_null()).then_some(arguments);

            let output = registry.dispatch(&function, arguments.as_ref()).await?;
            println!("{}", output);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));

    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt().with_env_filter(filter).finish(),
    )
    .is_err()
    {
        // tracing already initialised; ignore.
    }
    Ok(())
}
