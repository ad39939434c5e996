use anyhow::{Context, Result};
use log::LevelFilter;
use nalgebra::{UnitQuaternion, Vector3};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use avatar_tracking::avatar::{AvatarProfile, SkeletonAnchors};
use avatar_tracking::calibration::CalibrationMode;
use avatar_tracking::config::Settings;
use avatar_tracking::device::{DeviceUse, Hand, MockDeviceProvider};
use avatar_tracking::logger;
use avatar_tracking::pose::Pose;
use avatar_tracking::system::TrackingSystem;

const SETTINGS_PATH: &str = "settings.toml";
const SAMPLE_AVATAR: &str = "Sample.avatar";
const DELTA_TIME: f32 = 1.0 / 90.0;
/// 1コマンドごとに進めるティック数
const TICKS_PER_COMMAND: usize = 10;

fn open_log_file() -> Result<PathBuf> {
    std::fs::create_dir_all("logs")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Ok(PathBuf::from(format!("logs/avatar_tracking_{}.log", ts)))
}

/// avatars ディレクトリにサンプルのアバターが無ければ作る
fn load_sample_avatar(avatars_dir: &Path) -> Result<AvatarProfile> {
    let path = avatars_dir.join(SAMPLE_AVATAR);
    if !path.exists() {
        let mut avatar = AvatarProfile::new(SAMPLE_AVATAR, 1.5);
        avatar.skeleton = Some(SkeletonAnchors {
            origin: Pose::identity(),
            pelvis: Pose::from_position(Vector3::new(0.0, 0.85, 0.0)),
            left_foot: Pose::from_position(Vector3::new(-0.1, 0.08, 0.0)),
            right_foot: Pose::from_position(Vector3::new(0.1, 0.08, 0.0)),
        });
        std::fs::create_dir_all(avatars_dir).context("Failed to create avatars directory")?;
        let content = toml::to_string_pretty(&avatar).context("Failed to serialize avatar")?;
        std::fs::write(&path, content).context("Failed to write sample avatar")?;
        println!("サンプルのアバターを作成しました: {}", path.display());
    }
    AvatarProfile::load(&path)
}

fn run(system: &mut TrackingSystem<MockDeviceProvider>) {
    for _ in 0..TICKS_PER_COMMAND {
        system.tick(DELTA_TIME);
    }
}

fn print_poses(system: &TrackingSystem<MockDeviceProvider>) {
    for device_use in DeviceUse::ALL {
        match system.try_get_pose(device_use) {
            Some(pose) => {
                let p = pose.position;
                let (roll, pitch, yaw) = pose.rotation.euler_angles();
                println!(
                    "  {:<10} 位置: [{:7.3}, {:7.3}, {:7.3}]  回転(deg): [{:6.1}, {:6.1}, {:6.1}]",
                    device_use.to_string(),
                    p.x,
                    p.y,
                    p.z,
                    roll.to_degrees(),
                    pitch.to_degrees(),
                    yaw.to_degrees()
                );
            }
            None => println!("  {:<10} (無効)", device_use.to_string()),
        }
    }
}

fn parse_mode(arg: Option<&&str>) -> Option<CalibrationMode> {
    match arg.copied() {
        Some("auto") | Some("a") => Some(CalibrationMode::Automatic),
        Some("manual") | Some("m") => Some(CalibrationMode::Manual),
        _ => None,
    }
}

fn main() -> Result<()> {
    let log_path = open_log_file()?;
    logger::init(LevelFilter::Info, Some(&log_path))?;

    let settings = Settings::load_or_default(SETTINGS_PATH);
    let avatars_dir = settings.paths.avatars_dir.clone();
    let eye_height = settings.player_eye_height;

    println!("=== Avatar Tracking ({}) ===", env!("GIT_VERSION"));
    println!("ログ: {}", log_path.display());
    println!("キャリブレーション: {}", settings.paths.calibration_data.display());
    println!("プレイヤーの目の高さ: {:.3} m", eye_height);
    println!();
    println!("コマンド:");
    println!("  a             - 自動キャリブレーション開始");
    println!("  m             - 手動キャリブレーション開始");
    println!("  t             - 両手のトリガーを引く");
    println!("  c             - キャリブレーションを中止");
    println!("  x auto|manual - キャリブレーションを消去");
    println!("  w x y z       - 腰トラッカーを移動 (例: w 0 0.9 0)");
    println!("  r deg         - ルーム調整の回転 (例: r 90)");
    println!("  b             - キャリブレーション無視を切り替え");
    println!("  f             - 床の高さ調整を切り替え");
    println!("  p             - 補正済みポーズを表示");
    println!("  j             - キャリブレーションを JSON で表示");
    println!("  s             - 保存");
    println!("  q             - 終了");
    println!();

    let mut system = TrackingSystem::new(MockDeviceProvider::standing(eye_height), settings)
        .with_settings_path(SETTINGS_PATH);
    let avatar = load_sample_avatar(&avatars_dir)?;
    system.set_avatar(Some(avatar))?;
    run(&mut system);
    println!("モード: {:?}", system.calibration_mode());

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "a" => {
                system.begin_calibration(CalibrationMode::Automatic);
                println!("自動キャリブレーション中: T ポーズで両手のトリガーを引いてください");
            }
            "m" => {
                system.begin_calibration(CalibrationMode::Manual);
                println!("手動キャリブレーション中: アバターに合わせて両手のトリガーを引いてください");
            }
            "t" => {
                let provider = system.provider_mut();
                provider.set_trigger(Hand::Left, Some(1.0));
                provider.set_trigger(Hand::Right, Some(1.0));
                system.tick(DELTA_TIME);
                let provider = system.provider_mut();
                provider.set_trigger(Hand::Left, Some(0.0));
                provider.set_trigger(Hand::Right, Some(0.0));
                println!("モード: {:?}", system.calibration_mode());
            }
            "c" => {
                system.cancel_calibration();
                println!("中止しました");
            }
            "x" => match parse_mode(parts.get(1)) {
                Some(mode) => {
                    system.clear_calibration_data(mode)?;
                    println!("{:?} キャリブレーションを消去しました", mode);
                }
                None => println!("使い方: x auto|manual"),
            },
            "w" if parts.len() == 4 => {
                let x: f32 = parts[1].parse()?;
                let y: f32 = parts[2].parse()?;
                let z: f32 = parts[3].parse()?;
                let rotation = system
                    .provider()
                    .pose("LHR-WAIST")
                    .map_or_else(UnitQuaternion::identity, |p| p.rotation);
                system
                    .provider_mut()
                    .set_pose("LHR-WAIST", Pose::new(Vector3::new(x, y, z), rotation));
                println!("腰: [{}, {}, {}]", x, y, z);
            }
            "r" if parts.len() == 2 => {
                let rotation: f32 = parts[1].parse()?;
                let mut room_adjust = system.devices().room_adjust();
                room_adjust.rotation = rotation;
                system.set_room_adjust(room_adjust);
                println!("ルーム調整: {} deg", rotation);
            }
            "b" => {
                let Some(file_name) = system.avatar().map(|a| a.file_name.clone()) else {
                    println!("アバターがありません");
                    continue;
                };
                system.update_settings(|s| {
                    let avatar = s.avatar_mut(&file_name);
                    avatar.bypass_calibration = !avatar.bypass_calibration;
                });
                let bypass = system.settings().avatar(&file_name).bypass_calibration;
                println!("キャリブレーション無視: {}", if bypass { "ON" } else { "OFF" });
            }
            "f" => {
                system.update_settings(|s| s.floor_height_adjust = !s.floor_height_adjust);
                println!(
                    "床の高さ調整: {}",
                    if system.settings().floor_height_adjust { "ON" } else { "OFF" }
                );
            }
            "p" => {
                println!(
                    "モード: {:?}  キャリブレーション中: {:?}",
                    system.calibration_mode(),
                    system.rig().active_calibration_mode()
                );
                print_poses(&system);
            }
            "j" => {
                println!("{}", system.calibration_store().to_json()?);
            }
            "s" => {
                system.save()?;
                println!("保存しました");
            }
            "q" => {
                println!("終了します");
                break;
            }
            _ => {
                println!("不明なコマンド: {}", parts[0]);
            }
        }

        run(&mut system);
    }

    system.shutdown()
}
