//! `tether config`: show the resolved configuration

use crate::settings::Settings;

pub fn execute(settings: &Settings) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(&settings.redacted())?);
    Ok(())
}
