//! Display utilities for the focusmind CLI.
//!
//! This module provides formatted output for:
//! - Action results and error messages
//! - Status display with a progress bar
//! - Settings and available ambient sounds
//! - Session statistics

use std::fmt::Write as _;

use chrono::{Duration, NaiveDate};

use crate::session::{SessionStats, DAILY_WINDOW_DAYS};
use crate::sound::SoundSource;
use crate::types::{AmbientVariant, IpcResponse, TimerMode, TimerSettings, TimerStatus, TimerView};

/// Width of the progress bar in characters.
const PROGRESS_WIDTH: usize = 20;

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the daemon's message and the resulting timer line.
    pub fn show_action(response: &IpcResponse) {
        println!("* {}", response.message);
        if let Some(view) = response.timer() {
            println!("  {}", Self::format_summary(view));
        }
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        match response.timer() {
            Some(view) => print!("{}", Self::format_status(view)),
            None => println!("タイマーの状態を取得できませんでした"),
        }
    }

    /// Shows the settings in the response and which ambient sounds are installed.
    pub fn show_settings(response: &IpcResponse, installed: &[SoundSource]) {
        if !response.message.is_empty() {
            println!("* {}", response.message);
        }
        match response.data.as_ref().and_then(|d| d.settings.as_ref()) {
            Some(settings) => print!("{}", Self::format_settings(settings, installed)),
            None => println!("設定を取得できませんでした"),
        }
    }

    /// Shows session statistics.
    pub fn show_stats(stats: &SessionStats, user: Option<&str>, today: NaiveDate) {
        print!("{}", Self::format_stats(stats, user, today));
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// Formats seconds as `MM:SS`.
    pub fn format_time(total_seconds: u32) -> String {
        format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
    }

    /// Renders remaining time as a bar that shrinks as the interval runs.
    pub fn progress_bar(percentage: u8) -> String {
        let filled = usize::from(percentage.min(100)) * PROGRESS_WIDTH / 100;
        format!(
            "[{}{}] {:>3}%",
            "█".repeat(filled),
            "░".repeat(PROGRESS_WIDTH - filled),
            percentage.min(100)
        )
    }

    pub fn mode_label(mode: TimerMode) -> &'static str {
        match mode {
            TimerMode::Work => "作業",
            TimerMode::Break => "休憩",
        }
    }

    pub fn state_label(state: TimerStatus) -> &'static str {
        match state {
            TimerStatus::Idle => "待機中",
            TimerStatus::Running => "実行中",
            TimerStatus::PausedActive => "一時停止中",
            TimerStatus::AwaitingFeedback => "評価待ち",
        }
    }

    fn format_summary(view: &TimerView) -> String {
        format!(
            "{} {} {}",
            Self::mode_label(view.mode),
            Self::format_time(view.remaining_seconds),
            Self::state_label(view.state)
        )
    }

    fn format_status(view: &TimerView) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "focusmind ステータス");
        let _ = writeln!(out, "─────────────────────────────");
        let _ = writeln!(out, "モード: {}", Self::mode_label(view.mode));
        let _ = writeln!(out, "状態: {}", Self::state_label(view.state));
        let _ = writeln!(
            out,
            "残り時間: {} / {}",
            Self::format_time(view.remaining_seconds),
            Self::format_time(view.total_seconds)
        );
        let _ = writeln!(out, "{}", Self::progress_bar(view.percentage));
        match &view.user {
            Some(user) => {
                let _ = writeln!(out, "ユーザー: {}", user);
            }
            None => {
                let _ = writeln!(out, "ユーザー: ゲスト");
            }
        }
        if view.awaiting_feedback {
            let _ = writeln!(out, "評価待ち: 'focusmind rate <1-5>' で評価してください");
        }
        out
    }

    fn format_settings(settings: &TimerSettings, installed: &[SoundSource]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "作業時間: {}分", settings.work_minutes);
        let _ = writeln!(out, "休憩時間: {}分", settings.break_minutes);
        let _ = writeln!(
            out,
            "環境音: {}",
            if settings.ambient_sound_enabled {
                "オン"
            } else {
                "オフ"
            }
        );
        let _ = writeln!(out, "環境音の種類:");
        for variant in AmbientVariant::ALL {
            let marker = if variant == settings.ambient_sound_variant {
                "*"
            } else {
                " "
            };
            let is_installed = installed.iter().any(|s| {
                s.path()
                    .and_then(|p| p.file_stem())
                    .is_some_and(|stem| stem == variant.slug())
            });
            let missing = if is_installed {
                ""
            } else {
                " (ファイルなし)"
            };
            let _ = writeln!(out, " {} {} [{}]{}", marker, variant, variant.slug(), missing);
        }
        out
    }

    fn format_stats(stats: &SessionStats, user: Option<&str>, today: NaiveDate) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "作業セッションの統計 ({})", user.unwrap_or("全ユーザー"));
        let _ = writeln!(out, "─────────────────────────────");
        if stats.total_sessions == 0 {
            let _ = writeln!(out, "記録されたセッションはありません");
            return out;
        }

        let _ = writeln!(out, "セッション数: {}", stats.total_sessions);
        let _ = writeln!(out, "合計時間: {}分", stats.total_minutes);
        let _ = writeln!(out, "平均時間: {}分", stats.average_minutes);
        match stats.average_rating {
            Some(avg) => {
                let _ = writeln!(
                    out,
                    "平均評価: {:.1} ({}件)",
                    avg, stats.rated_sessions
                );
            }
            None => {
                let _ = writeln!(out, "平均評価: -");
            }
        }
        let _ = writeln!(out, "最長連続: {}セッション", stats.longest_streak);
        let _ = writeln!(out, "直近{}日:", DAILY_WINDOW_DAYS);
        for (i, count) in stats.last_week.iter().enumerate() {
            let days_ago = (DAILY_WINDOW_DAYS - 1 - i) as i64;
            let day = today - Duration::days(days_ago);
            let _ = writeln!(
                out,
                "  {} {:<10} {}",
                day.format("%m/%d"),
                "■".repeat(*count as usize),
                count
            );
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
