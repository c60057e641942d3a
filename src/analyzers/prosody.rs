//! Audio prosody analyzer — the only analyzer touching the waveform.
//!
//! Two interchangeable backends behind `ProsodyBackend`: a Praat subprocess
//! for real signal processing and a seedable calibrated-random estimator used
//! when Praat is unavailable. Interpretation is deterministic and
//! backend-independent; the analyzer as a whole never fails.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::analyzers::{AnalyzerKind, AnalyzerResult};
use crate::capabilities::ServiceError;

/// Fixed-order numeric tuple produced by both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProsodyMetrics {
    /// Syllables per second, via intensity-peak counting.
    pub speech_rate: f64,
    pub pitch_mean: f64,
    pub pitch_stdev: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,
    pub jitter: f64,
    pub shimmer: f64,
    pub pause_count: u32,
    pub pause_total_duration: f64,
    /// Pauses per second of audio.
    pub pause_rate: f64,
    /// True when values were estimated rather than measured. The UI discloses
    /// reduced confidence for simulated sections.
    pub simulated: bool,
}

/// Backend strategy: real signal processing, calibrated-random fallback, or a
/// test double.
#[async_trait]
pub trait ProsodyBackend: Send + Sync {
    /// Liveness probe; a backend reporting false is skipped without error.
    async fn available(&self) -> bool;
    async fn analyze(&self, audio: &[u8]) -> Result<ProsodyMetrics, ServiceError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Praat subprocess backend
// ────────────────────────────────────────────────────────────────────────────

/// Praat script: speech rate from intensity peaks, pitch statistics, local
/// jitter/shimmer, and silences longer than 0.3s. Results are written as a
/// single comma-separated line in fixed order.
const PRAAT_SCRIPT_TEMPLATE: &str = r#"sound = Read from file: "{audio_path}"

To TextGrid (silences): 100, 0, -25, 0.3, 0.1, "silent", "sounding"
textgrid = selected("TextGrid")
selectObject: sound

To Intensity: 75, 0.0, "yes"
To IntensityTier (peaks)
numPeaks = Get number of points

selectObject: sound
duration = Get total duration
speechRate = numPeaks / duration

To Pitch: 0.0, 75, 600
meanF0 = Get mean: 0, 0, "Hertz"
stdevF0 = Get standard deviation: 0, 0, "Hertz"
minF0 = Get minimum: 0, 0, "Hertz", "Parabolic"
maxF0 = Get maximum: 0, 0, "Hertz", "Parabolic"

selectObject: sound
To PointProcess (periodic, cc): 75, 600
jitter = Get jitter (local): 0, 0, 0.0001, 0.02, 1.3
shimmer = Get shimmer (local): 0, 0, 0.0001, 0.02, 1.3, 1.6

selectObject: textgrid
numberOfIntervals = Get number of intervals: 1
totalSilence = 0
numberOfPauses = 0
for i from 1 to numberOfIntervals
    label$ = Get label of interval: 1, i
    if label$ = "silent"
        start = Get starting point: 1, i
        end = Get end point: 1, i
        intervalDuration = end - start
        if intervalDuration > 0.3
            numberOfPauses = numberOfPauses + 1
            totalSilence = totalSilence + intervalDuration
        endif
    endif
endfor
pauseRate = numberOfPauses / duration

writeFileLine: "{results_path}", speechRate, ",", meanF0, ",", stdevF0, ",", minF0, ",", maxF0, ",", jitter, ",", shimmer, ",", numberOfPauses, ",", totalSilence, ",", pauseRate
"#;

/// Signal-processing backend shelling out to Praat. The scratch directory
/// (audio, script, result file) lives exactly as long as one analysis call,
/// cleaned up on every exit path by the `TempDir` guard.
pub struct PraatBackend {
    command: String,
}

impl PraatBackend {
    pub fn new() -> Self {
        Self {
            command: "praat".to_string(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

impl Default for PraatBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the fixed-order comma-separated result line Praat writes.
fn parse_praat_results(line: &str) -> Result<ProsodyMetrics, ServiceError> {
    let fields: Vec<f64> = line
        .trim()
        .split(',')
        .map(|f| f.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| ServiceError::Subprocess(format!("unparseable praat output: {e}")))?;

    if fields.len() != 10 {
        return Err(ServiceError::Subprocess(format!(
            "expected 10 praat result fields, got {}",
            fields.len()
        )));
    }

    Ok(ProsodyMetrics {
        speech_rate: fields[0],
        pitch_mean: fields[1],
        pitch_stdev: fields[2],
        pitch_min: fields[3],
        pitch_max: fields[4],
        jitter: fields[5],
        shimmer: fields[6],
        pause_count: fields[7] as u32,
        pause_total_duration: fields[8],
        pause_rate: fields[9],
        simulated: false,
    })
}

#[async_trait]
impl ProsodyBackend for PraatBackend {
    async fn available(&self) -> bool {
        tokio::process::Command::new(&self.command)
            .arg("--version")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn analyze(&self, audio: &[u8]) -> Result<ProsodyMetrics, ServiceError> {
        let dir = tempfile::tempdir()?;
        let audio_path = dir.path().join("answer.wav");
        let script_path = dir.path().join("analyze_voice.praat");
        let results_path = dir.path().join("voice_results.txt");

        tokio::fs::write(&audio_path, audio).await?;
        let script = PRAAT_SCRIPT_TEMPLATE
            .replace("{audio_path}", &audio_path.to_string_lossy())
            .replace("{results_path}", &results_path.to_string_lossy());
        tokio::fs::write(&script_path, script).await?;

        let output = tokio::process::Command::new(&self.command)
            .arg("--run")
            .arg(&script_path)
            .output()
            .await
            .map_err(|e| ServiceError::Subprocess(format!("praat invocation failed: {e}")))?;

        if !output.status.success() {
            return Err(ServiceError::Subprocess(format!(
                "praat exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let line = tokio::fs::read_to_string(&results_path).await?;
        let metrics = parse_praat_results(&line)?;
        debug!(
            speech_rate = metrics.speech_rate,
            pitch_stdev = metrics.pitch_stdev,
            "praat analysis complete"
        );
        Ok(metrics)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Calibrated-random fallback backend
// ────────────────────────────────────────────────────────────────────────────

/// Fallback estimator producing structurally complete metrics from bounded
/// ranges calibrated to plausible human speech. Seedable so tests are
/// deterministic; every value is tagged simulated.
pub struct SimulatedBackend {
    rng: Mutex<StdRng>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProsodyBackend for SimulatedBackend {
    async fn available(&self) -> bool {
        true
    }

    async fn analyze(&self, _audio: &[u8]) -> Result<ProsodyMetrics, ServiceError> {
        let mut rng = self.rng.lock().await;
        let pitch_mean = rng.gen_range(120.0..200.0);
        let pitch_stdev = rng.gen_range(10.0..50.0);
        let pause_count = rng.gen_range(2..10u32);
        Ok(ProsodyMetrics {
            speech_rate: rng.gen_range(3.5..5.0),
            pitch_mean,
            pitch_stdev,
            pitch_min: pitch_mean - pitch_stdev * 1.5,
            pitch_max: pitch_mean + pitch_stdev * 1.5,
            jitter: rng.gen_range(0.01..0.04),
            shimmer: rng.gen_range(0.05..0.11),
            pause_count,
            pause_total_duration: pause_count as f64 * 0.8,
            pause_rate: rng.gen_range(0.2..0.5),
            simulated: true,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Deterministic interpretation (backend-independent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    pub level: String,
    pub description: String,
    pub suggestion: String,
}

fn interp(level: &str, description: &str, suggestion: &str) -> Interpretation {
    Interpretation {
        level: level.to_string(),
        description: description.to_string(),
        suggestion: suggestion.to_string(),
    }
}

/// <3.0 syll/s slow, 3.0–4.5 optimal, >4.5 fast.
pub fn interpret_speech_rate(speech_rate: f64) -> Interpretation {
    if speech_rate < 3.0 {
        interp(
            "slow",
            "Your speaking rate is slower than average, which may make you sound thoughtful but could lose listener interest.",
            "Try to slightly increase your pace for more engagement while maintaining clarity.",
        )
    } else if speech_rate <= 4.5 {
        interp(
            "optimal",
            "Your speaking rate is at an ideal pace, which is engaging and easy to follow.",
            "Continue with this balanced rate - it's neither too fast nor too slow.",
        )
    } else {
        interp(
            "fast",
            "Your speaking rate is faster than average, which conveys enthusiasm but might reduce clarity.",
            "Consider slowing down slightly to ensure your points are fully understood.",
        )
    }
}

/// Pitch stdev <15 Hz monotone, 15–40 expressive, >40 highly variable.
pub fn interpret_pitch_variability(pitch_stdev: f64) -> Interpretation {
    if pitch_stdev < 15.0 {
        interp(
            "monotone",
            "Your voice has limited pitch variation, which may sound monotonous.",
            "Try to add more vocal variety by emphasizing key words with higher or lower pitch.",
        )
    } else if pitch_stdev <= 40.0 {
        interp(
            "expressive",
            "Your voice has good pitch variation, making you sound engaged and expressive.",
            "Maintain this level of vocal variety as it keeps listeners engaged.",
        )
    } else {
        interp(
            "highly_variable",
            "Your voice has significant pitch variation, which shows enthusiasm but may seem exaggerated.",
            "Consider moderating extreme pitch changes for a more balanced delivery.",
        )
    }
}

/// Jitter >0.02 and shimmer >0.08 rough; either alone slightly rough.
pub fn interpret_voice_quality(jitter: f64, shimmer: f64) -> Interpretation {
    let jitter_high = jitter > 0.02;
    let shimmer_high = shimmer > 0.08;
    if jitter_high && shimmer_high {
        interp(
            "rough",
            "Your voice exhibits some roughness or hoarseness.",
            "Consider vocal warm-ups before speaking, and ensure you're well-hydrated.",
        )
    } else if jitter_high || shimmer_high {
        interp(
            "slightly_rough",
            "Your voice has slight instability that may indicate tension or tiredness.",
            "Take deep breaths before speaking and maintain good posture for clearer voice production.",
        )
    } else {
        interp(
            "clear",
            "Your voice quality is clear and stable, which conveys confidence and competence.",
            "Continue maintaining this clear vocal quality through proper breathing and posture.",
        )
    }
}

/// Pause rate <0.15 few, 0.15–0.4 balanced, >0.4 frequent.
pub fn interpret_pauses(pause_rate: f64) -> Interpretation {
    if pause_rate < 0.15 {
        interp(
            "few",
            "You use fewer pauses than typical, which can make your speech sound rushed.",
            "Consider adding strategic pauses after important points to let information sink in.",
        )
    } else if pause_rate <= 0.4 {
        interp(
            "balanced",
            "You use a good balance of pauses, which creates a natural rhythm in your speech.",
            "Continue using these well-timed pauses to emphasize key points.",
        )
    } else {
        interp(
            "frequent",
            "You use frequent pauses, which may indicate hesitation or thoughtfulness.",
            "Try to reduce unintentional pauses and focus on strategic pauses for emphasis.",
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProsodyAssessment {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub overall_impression: String,
}

/// Maps how many dimensions hit their good bucket (optimal / expressive /
/// clear / balanced) to an overall impression tier: ≥3, 1–2, 0.
pub fn assess(
    speech_rate: &Interpretation,
    pitch: &Interpretation,
    voice_quality: &Interpretation,
    pauses: &Interpretation,
) -> ProsodyAssessment {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    if speech_rate.level == "optimal" {
        strengths.push("Your speaking pace is excellent - engaging and easy to follow.".to_string());
    } else {
        improvements.push(speech_rate.suggestion.clone());
    }
    if pitch.level == "expressive" {
        strengths.push("You use good vocal variety, which keeps listeners engaged.".to_string());
    } else {
        improvements.push(pitch.suggestion.clone());
    }
    if voice_quality.level == "clear" {
        strengths.push("Your voice quality is clear and projects confidence.".to_string());
    } else {
        improvements.push(voice_quality.suggestion.clone());
    }
    if pauses.level == "balanced" {
        strengths.push("You use well-timed pauses that create effective rhythm.".to_string());
    } else {
        improvements.push(pauses.suggestion.clone());
    }

    let overall_impression = match strengths.len() {
        n if n >= 3 => {
            "Your vocal delivery is very effective, conveying confidence and engagement. With minor adjustments, you can further enhance your speaking impact."
        }
        n if n >= 1 => {
            "Your vocal delivery has some strong elements, but could benefit from specific improvements to maximize your impact and engagement."
        }
        _ => {
            "Your vocal delivery would benefit from focused practice to better engage listeners and convey confidence."
        }
    }
    .to_string();

    ProsodyAssessment {
        strengths,
        improvements,
        overall_impression,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProsodyReport {
    pub metrics: ProsodyMetrics,
    pub speech_rate: Interpretation,
    pub pitch: Interpretation,
    pub voice_quality: Interpretation,
    pub pauses: Interpretation,
    pub assessment: ProsodyAssessment,
    pub simulated: bool,
}

impl ProsodyReport {
    /// Canonical 0–100 score: 25 points per dimension in its good bucket.
    pub fn canonical_score(&self) -> f64 {
        let strengths = self.assessment.strengths.len() as f64;
        strengths * 25.0
    }

    pub fn into_result(self) -> AnalyzerResult {
        let suggestions = self.assessment.improvements.clone();
        AnalyzerResult {
            kind: AnalyzerKind::Prosody,
            score: self.canonical_score(),
            details: json!({
                "metrics": self.metrics,
                "speech_rate": self.speech_rate,
                "pitch": self.pitch,
                "voice_quality": self.voice_quality,
                "pauses": self.pauses,
                "assessment": self.assessment,
            }),
            suggestions,
            degraded: self.simulated,
        }
    }
}

/// Builds the full report from raw metrics. Deterministic.
pub fn interpret(metrics: ProsodyMetrics) -> ProsodyReport {
    let speech_rate = interpret_speech_rate(metrics.speech_rate);
    let pitch = interpret_pitch_variability(metrics.pitch_stdev);
    let voice_quality = interpret_voice_quality(metrics.jitter, metrics.shimmer);
    let pauses = interpret_pauses(metrics.pause_rate);
    let assessment = assess(&speech_rate, &pitch, &voice_quality, &pauses);
    let simulated = metrics.simulated;

    ProsodyReport {
        metrics,
        speech_rate,
        pitch,
        voice_quality,
        pauses,
        assessment,
        simulated,
    }
}

/// Runs prosody analysis with graceful degradation: primary backend when
/// available, calibrated-random fallback otherwise. Never fails.
pub async fn analyze(
    audio: &[u8],
    primary: &dyn ProsodyBackend,
    fallback: &SimulatedBackend,
) -> ProsodyReport {
    if primary.available().await {
        match primary.analyze(audio).await {
            Ok(metrics) => return interpret(metrics),
            Err(e) => warn!("primary prosody backend failed ({e}), falling back to estimator"),
        }
    } else {
        debug!("primary prosody backend unavailable, using estimator");
    }

    match fallback.analyze(audio).await {
        Ok(metrics) => interpret(metrics),
        // SimulatedBackend::analyze is infallible in practice; keep the
        // schema complete even if that ever changes.
        Err(_) => interpret(ProsodyMetrics {
            speech_rate: 4.0,
            pitch_mean: 160.0,
            pitch_stdev: 25.0,
            pitch_min: 120.0,
            pitch_max: 200.0,
            jitter: 0.015,
            shimmer: 0.06,
            pause_count: 4,
            pause_total_duration: 3.2,
            pause_rate: 0.25,
            simulated: true,
        }),
    }
}
