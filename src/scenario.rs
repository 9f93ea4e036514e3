use crate::error::{SimError, SimResult};
use notify::Watcher;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Host side view of a scenario file. Everything the simulation can be tuned with,
/// validated on load. Out-of-range values never reach the device.
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    pub reset_sim_on_change: bool,

    pub particle_count: u32,
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z_min: f32,
    pub z_max: f32,

    pub wave_gen_amplitude: f32,
    pub wave_gen_frequency: f32,
    pub wave_gen_duty: f32,

    pub time_step: f32,
    pub solver_iterations: u32,
    pub sub_steps: u32,
    pub smoothing_length: f32,
    pub rest_density: f32,
    pub cfm_epsilon: f32,
    pub gravity: f32,
    pub vorticity_factor: f32,
    pub viscosity_factor: f32,
    pub surface_tension_k: f32,
    pub surface_tension_dist: f32,

    pub friends_circles: u32,
    pub particles_per_circle: u32,

    pub setup_spacing: f32,
    pub segment_size: u32,
    pub sort_iterations: u32,
    pub particle_render_size: f32,
}

fn parse_key_values(text: &str) -> HashMap<&str, &str> {
    let mut values = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        if let Some(separator) = line.find('=') {
            values.insert(line[..separator].trim(), line[separator + 1..].trim());
        }
    }
    values
}

fn required<'a>(values: &HashMap<&str, &'a str>, key: &str) -> SimResult<&'a str> {
    values
        .get(key)
        .copied()
        .ok_or_else(|| SimError::Config(format!("missing key \"{}\"", key)))
}

fn get_f32(values: &HashMap<&str, &str>, key: &str) -> SimResult<f32> {
    let value: f32 = required(values, key)?
        .parse()
        .map_err(|_| SimError::Config(format!("key \"{}\" is not a number", key)))?;
    if !value.is_finite() {
        return Err(SimError::Config(format!("key \"{}\" is not finite", key)));
    }
    Ok(value)
}

fn get_u32(values: &HashMap<&str, &str>, key: &str) -> SimResult<u32> {
    required(values, key)?
        .parse()
        .map_err(|_| SimError::Config(format!("key \"{}\" is not an unsigned integer", key)))
}

fn get_u32_or(values: &HashMap<&str, &str>, key: &str, default: u32) -> SimResult<u32> {
    match values.get(key) {
        Some(value) => value
            .parse()
            .map_err(|_| SimError::Config(format!("key \"{}\" is not an unsigned integer", key))),
        None => Ok(default),
    }
}

impl Scenario {
    pub fn from_file(path: &Path) -> SimResult<Scenario> {
        let text = std::fs::read_to_string(path).map_err(|err| SimError::Config(format!("failed to read scenario {:?}: {}", path, err)))?;
        Scenario::from_str(&text)
    }

    pub fn from_str(text: &str) -> SimResult<Scenario> {
        let values = parse_key_values(text);

        let scenario = Scenario {
            reset_sim_on_change: get_u32(&values, "resetSimOnChange")? != 0,

            particle_count: get_u32(&values, "particleCount")?,
            x_min: get_f32(&values, "xMin")?,
            x_max: get_f32(&values, "xMax")?,
            y_min: get_f32(&values, "yMin")?,
            y_max: get_f32(&values, "yMax")?,
            z_min: get_f32(&values, "zMin")?,
            z_max: get_f32(&values, "zMax")?,

            wave_gen_amplitude: get_f32(&values, "waveGenAmp")?,
            wave_gen_frequency: get_f32(&values, "waveGenFreq")?,
            wave_gen_duty: get_f32(&values, "waveGenDuty")?,

            time_step: get_f32(&values, "timeStep")?,
            solver_iterations: get_u32(&values, "simIterations")?,
            sub_steps: get_u32(&values, "subSteps")?,
            smoothing_length: get_f32(&values, "h")?,
            rest_density: get_f32(&values, "restDensity")?,
            cfm_epsilon: get_f32(&values, "epsilon")?,
            gravity: get_f32(&values, "gravity")?,
            vorticity_factor: get_f32(&values, "vorticityFactor")?,
            viscosity_factor: get_f32(&values, "viscosityFactor")?,
            surface_tension_k: get_f32(&values, "surfaceTensionK")?,
            surface_tension_dist: get_f32(&values, "surfaceTensionDist")?,

            friends_circles: get_u32(&values, "friendsCircles")?,
            particles_per_circle: get_u32(&values, "particlesPerCircle")?,

            setup_spacing: get_f32(&values, "setupSpacing")?,
            segment_size: get_u32_or(&values, "segmentSize", 128)?,
            sort_iterations: get_u32_or(&values, "sortIterations", 2)?,
            particle_render_size: get_f32(&values, "particleRenderSize")?,
        };

        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> SimResult<()> {
        fn check(condition: bool, message: &str) -> SimResult<()> {
            if condition {
                Ok(())
            } else {
                Err(SimError::Config(message.to_string()))
            }
        }

        check(self.particle_count >= 1, "particleCount must be at least 1")?;
        check(self.x_max > self.x_min, "xMax must be greater than xMin")?;
        check(self.y_max > self.y_min, "yMax must be greater than yMin")?;
        check(self.z_max > self.z_min, "zMax must be greater than zMin")?;
        check(self.smoothing_length > 0.0, "h must be positive")?;

        let min_extent = (self.x_max - self.x_min).min(self.y_max - self.y_min).min(self.z_max - self.z_min);
        check(min_extent >= self.smoothing_length, "domain must span at least one smoothing length per axis")?;

        check(self.time_step > 0.0, "timeStep must be positive")?;
        check(self.solver_iterations >= 1, "simIterations must be at least 1")?;
        check(self.sub_steps >= 1, "subSteps must be at least 1")?;
        check(self.rest_density > 0.0, "restDensity must be positive")?;
        check(self.cfm_epsilon > 0.0, "epsilon must be positive")?;
        check(self.vorticity_factor >= 0.0, "vorticityFactor must not be negative")?;
        check(self.viscosity_factor >= 0.0, "viscosityFactor must not be negative")?;
        check(self.surface_tension_k >= 0.0 && self.surface_tension_k <= 1.0, "surfaceTensionK must be within [0, 1]")?;
        check(
            self.surface_tension_dist > 0.0 && self.surface_tension_dist <= 1.0,
            "surfaceTensionDist must be within (0, 1]",
        )?;
        check(self.friends_circles >= 1 && self.friends_circles <= 16, "friendsCircles must be within [1, 16]")?;
        check(
            self.particles_per_circle >= 1 && self.particles_per_circle <= 64,
            "particlesPerCircle must be within [1, 64]",
        )?;
        check(self.setup_spacing > 0.0, "setupSpacing must be positive")?;
        check(self.wave_gen_amplitude >= 0.0, "waveGenAmp must not be negative")?;
        check(self.wave_gen_frequency >= 0.0, "waveGenFreq must not be negative")?;
        check(self.wave_gen_duty > 0.0, "waveGenDuty must be positive")?;
        check(self.particle_render_size > 0.0, "particleRenderSize must be positive")?;

        Ok(())
    }
}

/// Watches a single scenario file for edits, same mechanism as the shader directory watcher.
pub struct ScenarioFile {
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
    detected_change: Arc<AtomicBool>,
    path: PathBuf,
}

impl ScenarioFile {
    pub fn new(path: &Path) -> ScenarioFile {
        let detected_change = Arc::new(AtomicBool::new(false));
        let detected_change_evt_ref = detected_change.clone();
        let mut watcher: notify::RecommendedWatcher = notify::Watcher::new_immediate(move |res| match res {
            Ok(_) => detected_change_evt_ref.store(true, Ordering::Relaxed),
            Err(e) => error!("failed to watch scenario file: {:?}", e),
        })
        .unwrap();
        watcher.watch(path, notify::RecursiveMode::NonRecursive).unwrap();

        ScenarioFile {
            watcher,
            detected_change,
            path: PathBuf::from(path),
        }
    }

    pub fn detected_change(&self) -> bool {
        self.detected_change.swap(false, Ordering::Relaxed)
    }

    pub fn load(&self) -> SimResult<Scenario> {
        Scenario::from_file(&self.path)
    }
}
