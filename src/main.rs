mod coverage;
mod detection;
mod dispatcher;
mod events;
mod logging;
mod models;
mod movement;
mod pathfinding;
mod scenario;
mod simulation;
mod state;

use clap::{Arg, Command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use events::{InboundMessage, SimEvent};
use logging::{LogConfig, init_logging};
use scenario::ScenarioConfig;
use simulation::{RunSummary, SimulationEngine};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("sarfleet")
        .version("0.1.0")
        .about("ドローンフリート捜索救助シミュレーション")
        .long_about("複数ドローンによる捜索救助フリートのシミュレーションコアです。\n\
                     イベントを標準出力へJSON Linesで送出し、手動コマンドを標準入力から受け付けます。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、既定の設定（10機、30x30グリッド）で実行されます。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("ticks")
                .short('n')
                .long("ticks")
                .value_name("COUNT")
                .value_parser(clap::value_parser!(u64))
                .help("実行する最大ティック数（シナリオの設定を上書き）")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let log_config = match LogConfig::from_cli(
        matches.get_one::<String>("log-level").map(String::as_str),
        matches.get_one::<String>("log-output").map(String::as_str),
        verbose_level,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(2);
        }
    };
    let _log_guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    let scenario_path = matches.get_one::<String>("scenario").map(String::as_str);
    let max_ticks = matches.get_one::<u64>("ticks").copied();

    match run_scenario(scenario_path, matches.get_flag("info"), max_ticks, verbose_level) {
        Ok(Some(summary)) => {
            eprintln!(
                "シミュレーション終了: {}ティック, 走査率 {:.1}%, 生存者 {}名 (未救助 {}名), 中継機 {}基",
                summary.ticks,
                summary.coverage_ratio * 100.0,
                summary.survivors,
                summary.unrescued,
                summary.relays
            );
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    }
}

/// シナリオを読み込んで実行
fn run_scenario(
    scenario_path: Option<&str>,
    info_only: bool,
    max_ticks: Option<u64>,
    verbose_level: u8,
) -> Result<Option<RunSummary>, Box<dyn std::error::Error>> {
    let mut scenario = match scenario_path {
        Some(path) => {
            let scenario = ScenarioConfig::from_file(path)?;
            info!("シナリオファイル読み込み完了: {}", path);
            scenario
        }
        None => ScenarioConfig::default(),
    };

    if info_only {
        scenario.print_summary();
        return Ok(None);
    }

    if max_ticks.is_some() {
        scenario.sim.max_ticks = max_ticks;
    }

    let engine = SimulationEngine::new(scenario, verbose_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(execute(engine))?;

    // 標準入力の読み取りはブロッキングスレッド上にあるため待たずに終了する
    runtime.shutdown_background();

    Ok(Some(summary))
}

/// 入出力タスクを起動してエンジンを実行
async fn execute(mut engine: SimulationEngine) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SimEvent>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundMessage>();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let writer = tokio::spawn(write_events(event_rx));
    tokio::spawn(read_commands(inbound_tx));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("停止要求を受信しました");
            let _ = shutdown_tx.send(true);
        }
    });

    let simulation =
        tokio::spawn(async move { engine.run(event_tx, inbound_rx, shutdown_rx).await });
    let summary = simulation.await?;

    // 送信側はrunの終了とともに破棄されるので、残りのイベントを書き切って終わる
    writer.await?;

    Ok(summary)
}

/// イベントを1行1件のJSONとして標準出力へ書き出す
async fn write_events(mut events: mpsc::UnboundedReceiver<SimEvent>) {
    while let Some(event) = events.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("イベントのシリアライズに失敗: {}", e),
        }
    }
}

/// 標準入力からコマンドを1行ずつ読み取る
async fn read_commands(inbound: mpsc::UnboundedSender<InboundMessage>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match InboundMessage::parse(&line) {
                    Some(message) => {
                        if inbound.send(message).is_err() {
                            break;
                        }
                    }
                    None => warn!("解釈できないコマンドを無視: {}", line),
                }
            }
            Ok(None) => {
                debug!("標準入力が閉じられました");
                break;
            }
            Err(e) => {
                warn!("標準入力の読み取りに失敗: {}", e);
                break;
            }
        }
    }
}
