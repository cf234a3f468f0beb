//! Emoji used in terminal output, with plain-text fallbacks.

use console::Emoji;

// Status
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");

// Deploy
pub static ROBOT: Emoji<'_, '_> = Emoji("🤖 ", "");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "");
