//! Gherkin feature files

use std::path::{Path, PathBuf};

use gherkin::GherkinEnv;

use crate::error::{E2eError, E2eResult};

/// A parsed `.feature` file
#[derive(Debug, Clone)]
pub struct FeatureFile {
    pub path: Option<PathBuf>,
    pub name: String,
    pub scenarios: Vec<ScenarioSpec>,
}

/// One scenario with background steps already prepended
#[derive(Debug, Clone)]
pub struct ScenarioSpec {
    pub feature: String,
    pub name: String,
    /// Feature, rule and scenario tags, without the leading `@`
    pub tags: Vec<String>,
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub keyword: String,
    pub text: String,
}

impl StepSpec {
    pub fn label(&self) -> String {
        format!("{} {}", self.keyword, self.text)
    }
}

impl ScenarioSpec {
    /// `Feature: Scenario`, used in reports
    pub fn full_name(&self) -> String {
        format!("{}: {}", self.feature, self.name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('@');
        self.tags.iter().any(|t| t.trim_start_matches('@') == tag)
    }
}

impl FeatureFile {
    /// Parse feature text
    pub fn parse(source: &str) -> E2eResult<Self> {
        let feature = gherkin::Feature::parse(source, GherkinEnv::default()).map_err(|e| {
            E2eError::FeatureParse {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self::from_gherkin(feature, None))
    }

    /// Parse a feature file from disk
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let feature = gherkin::Feature::parse_path(path, GherkinEnv::default()).map_err(|e| {
            E2eError::FeatureParse {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self::from_gherkin(feature, Some(path.to_path_buf())))
    }

    /// Load every `.feature` file below `dir`, in path order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|ext| ext == "feature").unwrap_or(false))
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    fn from_gherkin(feature: gherkin::Feature, path: Option<PathBuf>) -> Self {
        let background = background_steps(feature.background.as_ref());
        let mut scenarios = Vec::new();

        for scenario in &feature.scenarios {
            scenarios.push(scenario_spec(
                &feature.name,
                &feature.tags,
                &background,
                scenario,
            ));
        }

        for rule in &feature.rules {
            let mut steps = background.clone();
            steps.extend(background_steps(rule.background.as_ref()));
            let mut tags = feature.tags.clone();
            tags.extend(rule.tags.iter().cloned());

            for scenario in &rule.scenarios {
                scenarios.push(scenario_spec(&feature.name, &tags, &steps, scenario));
            }
        }

        Self {
            path,
            name: feature.name,
            scenarios,
        }
    }

    /// All scenarios, optionally limited to those carrying `tag`
    pub fn scenarios_tagged<'a>(
        features: &'a [Self],
        tag: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ScenarioSpec> + 'a {
        features
            .iter()
            .flat_map(|f| f.scenarios.iter())
            .filter(move |s| tag.map_or(true, |t| s.has_tag(t)))
    }
}

fn step_spec(step: &gherkin::Step) -> StepSpec {
    StepSpec {
        keyword: step.keyword.trim().to_string(),
        text: step.value.trim().to_string(),
    }
}

fn background_steps(background: Option<&gherkin::Background>) -> Vec<StepSpec> {
    background
        .map(|b| b.steps.iter().map(step_spec).collect())
        .unwrap_or_default()
}

fn scenario_spec(
    feature: &str,
    inherited_tags: &[String],
    background: &[StepSpec],
    scenario: &gherkin::Scenario,
) -> ScenarioSpec {
    let mut tags = inherited_tags.to_vec();
    tags.extend(scenario.tags.iter().cloned());

    let mut steps = background.to_vec();
    steps.extend(scenario.steps.iter().map(step_spec));

    ScenarioSpec {
        feature: feature.to_string(),
        name: scenario.name.clone(),
        tags,
        steps,
    }
}
