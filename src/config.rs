use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use glam::Vec2;

use crate::demo::{DemoConfig, DemoVariant};
use crate::headless::HeadlessOptions;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "shading-lab",
    version,
    about = "Interactive material preview with an orbit camera and live shading sliders"
)]
pub struct CliOptions {
    /// Built-in demo to run (see --list).
    #[arg(long, default_value = "clearcoat", conflicts_with = "demo_file")]
    pub variant: String,

    /// Demo description XML to load instead of a built-in variant.
    #[arg(long, value_name = "PATH")]
    pub demo_file: Option<PathBuf>,

    /// Equirectangular panorama lighting the scene, overriding the demo's own.
    #[arg(long, value_name = "PATH")]
    pub environment: Option<PathBuf>,

    #[arg(long, default_value_t = 800)]
    pub width: u32,

    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Present without waiting for the display refresh.
    #[arg(long)]
    pub no_vsync: bool,

    /// Render with the recording backend instead of opening a window.
    #[arg(long)]
    pub headless: bool,

    /// Frames rendered in headless mode.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub frames: u32,

    /// Slider value applied on the first headless frame.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub sets: Vec<(String, f32)>,

    /// Orbit drag applied on the first headless frame.
    #[arg(long, value_name = "DX,DY", value_parser = parse_drag, allow_hyphen_values = true)]
    pub drag: Option<Vec2>,

    /// Wheel notches applied on the first headless frame.
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        value_parser = parse_finite
    )]
    pub wheel: f32,

    /// Print the built-in variants and exit.
    #[arg(long)]
    pub list: bool,
}

impl CliOptions {
    pub fn demo(&self) -> Result<DemoConfig> {
        let mut config = self.base_demo()?;
        if let Some(path) = &self.environment {
            config.environment = Some(path.clone());
        }
        Ok(config)
    }

    fn base_demo(&self) -> Result<DemoConfig> {
        if let Some(path) = &self.demo_file {
            return DemoConfig::load(path);
        }
        let variant = DemoVariant::from_name(&self.variant).ok_or_else(|| {
            let known: Vec<_> = DemoVariant::ALL.iter().map(|v| v.name()).collect();
            anyhow!(
                "unknown variant {}; expected one of {}",
                self.variant,
                known.join(", ")
            )
        })?;
        DemoConfig::builtin(variant)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Scripted input for a headless run; every `--set` must name a slider.
    pub fn headless_options(&self, config: &DemoConfig) -> Result<HeadlessOptions> {
        let params = config.material_parameters();
        for (name, _) in &self.sets {
            params.get(name)?;
            if !config.sliders().any(|row| &row.param == name) {
                bail!("parameter {name} has no slider in demo {}", config.name);
            }
        }
        Ok(HeadlessOptions {
            frames: self.frames,
            aspect: self.aspect_ratio(),
            drag: self.drag,
            wheel: self.wheel,
            sets: self.sets.clone(),
        })
    }
}

fn parse_assignment(raw: &str) -> Result<(String, f32), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("parameter name is empty".into());
    }
    let value = parse_finite(value).map_err(|err| format!("invalid value for {name}: {err}"))?;
    Ok((name.to_string(), value))
}

fn parse_drag(raw: &str) -> Result<Vec2, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected DX,DY, got {raw}"))?;
    let parse =
        |part: &str| parse_finite(part).map_err(|err| format!("invalid drag component {part}: {err}"));
    Ok(Vec2::new(parse(x)?, parse(y)?))
}

fn parse_finite(raw: &str) -> Result<f32, String> {
    let value = raw.trim().parse::<f32>().map_err(|err| err.to_string())?;
    if !value.is_finite() {
        return Err(format!("{} is not a finite number", raw.trim()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::try_parse_from(std::iter::once("shading-lab").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_open_an_800_square_window() {
        let options = parse(&[]);
        assert_eq!(options.variant, "clearcoat");
        assert_eq!((options.width, options.height), (800, 800));
        assert_eq!(options.frames, 1);
        assert!(!options.headless);
        assert_eq!(options.aspect_ratio(), 1.0);
    }

    #[test]
    fn scripted_input_is_parsed() {
        let options = parse(&[
            "--headless",
            "--set",
            "roughness=0.8",
            "--set",
            "ior = 2",
            "--drag",
            "-100,20",
            "--wheel",
            "-3",
        ]);
        assert_eq!(
            options.sets,
            [("roughness".to_string(), 0.8), ("ior".to_string(), 2.0)]
        );
        assert_eq!(options.drag, Some(Vec2::new(-100.0, 20.0)));
        assert_eq!(options.wheel, -3.0);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(parse_assignment("roughness").is_err());
        assert!(parse_assignment("=1").is_err());
        assert!(parse_drag("10").is_err());
        assert!(CliOptions::try_parse_from(["shading-lab", "--frames", "0"]).is_err());
        assert!(CliOptions::try_parse_from([
            "shading-lab",
            "--variant",
            "phong",
            "--demo-file",
            "demo.xml"
        ])
        .is_err());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(parse_assignment("roughness=NaN").is_err());
        assert!(parse_assignment("ior=inf").is_err());
        assert!(parse_drag("NaN,0").is_err());
        assert!(parse_drag("0,-inf").is_err());
        assert!(CliOptions::try_parse_from(["shading-lab", "--wheel", "NaN"]).is_err());
        assert_eq!(parse_finite(" -2.5 "), Ok(-2.5));
    }

    #[test]
    fn sets_must_target_sliders() {
        let config = DemoConfig::builtin(DemoVariant::SpecularPhong).unwrap();
        assert!(parse(&["--set", "roughness=2"])
            .headless_options(&config)
            .is_ok());
        assert!(parse(&["--set", "metallic=0.1"])
            .headless_options(&config)
            .is_err());
        assert!(parse(&["--set", "lightColor=1"])
            .headless_options(&config)
            .is_err());
    }

    #[test]
    fn environment_flag_overrides_the_demo() {
        let config = parse(&["--variant", "ambient-ibl", "--environment", "sky.jpg"])
            .demo()
            .unwrap();
        assert_eq!(config.environment, Some(PathBuf::from("sky.jpg")));
        assert_eq!(parse(&[]).demo().unwrap().environment, None);
    }

    #[test]
    fn unknown_variant_lists_choices() {
        let err = parse(&["--variant", "toon"]).demo().unwrap_err();
        assert!(err.to_string().contains("ambient-simple"));
    }
}
