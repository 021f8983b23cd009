//! Baked motion: one snapshot of every occurrence transform per sampled
//! angle of the rotation parameter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DocumentRef;
use crate::model::{ConfigurationMetadata, Occurrence};
use crate::scene::occurrence_transform;
use crate::source::{AssemblySource, ConfigurationSource};
use crate::{BakeError, Result};

/// Transforms of all occurrences at one angle, keyed by occurrence path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionFrame {
    pub angle_deg: f64,
    /// Row-major 4x4 transforms, flattened.
    pub occurrences: BTreeMap<String, [f64; 16]>,
}

impl MotionFrame {
    /// Snapshots every occurrence of an assembly state.
    pub fn capture(angle_deg: f64, occurrences: &[Occurrence]) -> Result<Self> {
        let occurrences = occurrences
            .iter()
            .map(|occurrence| {
                let transform = occurrence_transform(occurrence)?;
                Ok((occurrence.key(), flatten_row_major(&transform)))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            angle_deg,
            occurrences,
        })
    }
}

fn flatten_row_major(transform: &crate::scene::Transform) -> [f64; 16] {
    let mut flat = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            flat[row * 4 + col] = transform[(row, col)];
        }
    }
    flat
}

/// Complete baked animation of one run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionTrack {
    pub metadata: DocumentRef,
    pub angles_deg: Vec<f64>,
    pub frames: Vec<MotionFrame>,
}

impl MotionTrack {
    /// Occurrence keys missing from some frame but present in another.
    /// Empty when the assembly topology is the same at every angle.
    pub fn inconsistent_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .frames
            .iter()
            .flat_map(|frame| frame.occurrences.keys())
            .filter(|key| {
                self.frames
                    .iter()
                    .any(|frame| !frame.occurrences.contains_key(key.as_str()))
            })
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Finds the id of the parameter called `name`.
pub fn resolve_parameter_id(metadata: &ConfigurationMetadata, name: &str) -> Result<String> {
    metadata
        .configuration_parameters
        .iter()
        .find(|parameter| parameter.parameter_name == name)
        .map(|parameter| parameter.parameter_id.clone())
        .ok_or_else(|| BakeError::ParameterNotFound(name.to_string()))
}

/// Samples the assembly at every angle, in order.
///
/// The rotation parameter is resolved once before any frame is taken. Any
/// failure aborts the whole track.
pub fn sample_motion<S>(
    source: &S,
    parameter_name: &str,
    angles_deg: &[f64],
    metadata: DocumentRef,
) -> Result<MotionTrack>
where
    S: AssemblySource + ConfigurationSource + ?Sized,
{
    let parameter_id = resolve_parameter_id(&source.configuration()?, parameter_name)?;

    let mut frames = Vec::with_capacity(angles_deg.len());
    for (index, &angle) in angles_deg.iter().enumerate() {
        tracing::info!(angle, frame = index + 1, total = angles_deg.len(), "sampling configuration");
        let encoded = source.encode_configuration(&parameter_id, angle)?;
        let assembly = source.assembly(Some(&encoded))?;
        frames.push(MotionFrame::capture(angle, &assembly.root_assembly.occurrences)?);
    }

    Ok(MotionTrack {
        metadata,
        angles_deg: angles_deg.to_vec(),
        frames,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::model::{Assembly, ConfigurationParameter, RootAssembly};

    /// Rotates the `SUB/ARM` occurrence about Z by the encoded angle.
    struct RotatingSource {
        parameters: Vec<ConfigurationParameter>,
        encoded: RefCell<Vec<String>>,
        fail_at: Option<String>,
        truncate_at: Option<String>,
    }

    impl RotatingSource {
        fn new() -> Self {
            Self {
                parameters: vec![
                    ConfigurationParameter {
                        parameter_id: "other".into(),
                        parameter_name: "length".into(),
                    },
                    ConfigurationParameter {
                        parameter_id: "theta-id".into(),
                        parameter_name: "thetaDeg".into(),
                    },
                ],
                encoded: RefCell::new(Vec::new()),
                fail_at: None,
                truncate_at: None,
            }
        }
    }

    impl ConfigurationSource for RotatingSource {
        fn configuration(&self) -> Result<ConfigurationMetadata> {
            Ok(ConfigurationMetadata {
                configuration_parameters: self.parameters.clone(),
            })
        }

        fn encode_configuration(&self, parameter_id: &str, degrees: f64) -> Result<String> {
            let token = format!("{parameter_id}={degrees}");
            self.encoded.borrow_mut().push(token.clone());
            Ok(token)
        }
    }

    impl AssemblySource for RotatingSource {
        fn assembly(&self, configuration: Option<&str>) -> Result<Assembly> {
            let token = configuration.unwrap_or("theta-id=0");
            if self.fail_at.as_deref() == Some(token) {
                return Err(BakeError::Http {
                    url: "assemblies".into(),
                    status: 500,
                    body: String::new(),
                });
            }
            let degrees: f64 = token.rsplit('=').next().unwrap().parse().unwrap();
            let (sin, cos) = degrees.to_radians().sin_cos();
            let mut arm = vec![
                cos, -sin, 0.0, 0.0, //
                sin, cos, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ];
            if self.truncate_at.as_deref() == Some(token) {
                arm.pop();
            }
            Ok(Assembly {
                root_assembly: RootAssembly {
                    instances: Vec::new(),
                    occurrences: vec![
                        Occurrence {
                            path: vec!["SUB".into(), "ARM".into()],
                            transform: arm,
                        },
                        Occurrence {
                            path: vec!["BASE".into()],
                            transform: vec![
                                1.0, 0.0, 0.0, 0.0, //
                                0.0, 1.0, 0.0, 0.0, //
                                0.0, 0.0, 1.0, 0.0, //
                                0.0, 0.0, 0.0, 1.0,
                            ],
                        },
                    ],
                },
            })
        }
    }

    fn metadata() -> DocumentRef {
        DocumentRef {
            did: "D".into(),
            wvm: "w".into(),
            wvmid: "W".into(),
            eid: "E".into(),
        }
    }

    #[test]
    fn frames_follow_angle_order() {
        let source = RotatingSource::new();
        let angles = [0.0, 90.0, 180.0, 270.0];

        let track = sample_motion(&source, "thetaDeg", &angles, metadata()).unwrap();

        assert_eq!(track.frames.len(), 4);
        let tagged: Vec<f64> = track.frames.iter().map(|f| f.angle_deg).collect();
        assert_eq!(tagged, angles);
        assert_eq!(track.angles_deg, angles);
        assert_eq!(source.encoded.borrow()[1], "theta-id=90");
    }

    #[test]
    fn frames_hold_row_major_transforms() {
        let source = RotatingSource::new();
        let track = sample_motion(&source, "thetaDeg", &[90.0], metadata()).unwrap();

        let arm = track.frames[0].occurrences["SUB/ARM"];
        assert!((arm[0]).abs() < 1e-12);
        assert!((arm[1] + 1.0).abs() < 1e-12);
        assert!((arm[4] - 1.0).abs() < 1e-12);
        assert_eq!(arm[15], 1.0);
        assert!(track.inconsistent_keys().is_empty());
    }

    #[test]
    fn unsampled_order_is_kept() {
        let source = RotatingSource::new();
        let track = sample_motion(&source, "thetaDeg", &[270.0, 0.0, 45.0], metadata()).unwrap();
        let tagged: Vec<f64> = track.frames.iter().map(|f| f.angle_deg).collect();
        assert_eq!(tagged, [270.0, 0.0, 45.0]);
    }

    #[test]
    fn missing_parameter_aborts_before_sampling() {
        let source = RotatingSource::new();

        let err = sample_motion(&source, "phiDeg", &[0.0, 90.0], metadata()).unwrap_err();

        assert!(matches!(err, BakeError::ParameterNotFound(ref name) if name == "phiDeg"));
        assert!(source.encoded.borrow().is_empty());
    }

    #[test]
    fn collaborator_failure_is_surfaced() {
        let mut source = RotatingSource::new();
        source.fail_at = Some("theta-id=90".into());

        let err = sample_motion(&source, "thetaDeg", &[0.0, 90.0, 180.0], metadata()).unwrap_err();
        assert!(matches!(err, BakeError::Http { status: 500, .. }));
    }

    #[test]
    fn short_transform_in_any_frame_aborts() {
        let mut source = RotatingSource::new();
        source.truncate_at = Some("theta-id=180".into());

        let result = sample_motion(&source, "thetaDeg", &[0.0, 90.0, 180.0, 270.0], metadata());

        match result {
            Err(BakeError::MalformedTransform { path, len }) => {
                assert_eq!(path, "SUB/ARM");
                assert_eq!(len, 15);
            }
            other => panic!("expected a malformed transform error, got {other:?}"),
        }
        assert_eq!(source.encoded.borrow().len(), 3);
    }

    #[test]
    fn capture_rejects_short_transform() {
        let occurrence = Occurrence {
            path: vec!["A".into()],
            transform: vec![0.0; 15],
        };
        let err = MotionFrame::capture(0.0, &[occurrence]).unwrap_err();
        assert!(matches!(err, BakeError::MalformedTransform { len: 15, .. }));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let source = RotatingSource::new();
        let track = sample_motion(&source, "thetaDeg", &[0.0], metadata()).unwrap();

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["metadata"]["did"], "D");
        assert_eq!(json["anglesDeg"][0], 0.0);
        assert_eq!(json["frames"][0]["angleDeg"], 0.0);
        assert_eq!(json["frames"][0]["occurrences"]["BASE"].as_array().unwrap().len(), 16);
    }

    #[test]
    fn reports_keys_missing_from_some_frames() {
        let mut occurrences = BTreeMap::new();
        occurrences.insert("A".to_string(), [0.0; 16]);
        let mut both = occurrences.clone();
        both.insert("B".to_string(), [0.0; 16]);

        let track = MotionTrack {
            metadata: metadata(),
            angles_deg: vec![0.0, 1.0],
            frames: vec![
                MotionFrame {
                    angle_deg: 0.0,
                    occurrences,
                },
                MotionFrame {
                    angle_deg: 1.0,
                    occurrences: both,
                },
            ],
        };

        assert_eq!(track.inconsistent_keys(), vec!["B".to_string()]);
    }
}
