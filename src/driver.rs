/// Runs one scenario of a setup against a configuration editor.
///
/// The runner computes the directories of the scenario, finds its parent
/// (the baseline it derives from, possibly in another group), and then
/// replays the scenario's actions in the static pass and, later, in the
/// dynamic pass.
use crate::actions::Phase;
use crate::editor::{ConfigEditor, EditorRegistry, EditorTarget};
use crate::errors::Error;
use crate::scenario::ScenarioGroup;
use crate::settings::Settings;
use crate::setup::ScenarioSetup;
use crate::template::TemplateContext;
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};
use ustr::Ustr;

pub const MCS_VALUES: &str = "mcsValues";
const MCS_VALUES_FILE: &str = "mcsValues.xml";

/// The baseline a scenario derives from, and where its files were written
#[derive(Debug)]
pub struct Parent {
    pub target: EditorTarget,
    pub scenario_dir: PathBuf,
}

pub struct ScenarioRunner<'a> {
    setup: Rc<ScenarioSetup>,
    settings: &'a Settings,
    editor: Box<dyn ConfigEditor>,
    parent: Option<Parent>,
    scenario_dir: PathBuf,
    dirs: TemplateContext,
}

/// Where the files for a scenario are written
fn output_dir(settings: &Settings, group: &ScenarioGroup, name: Ustr) -> PathBuf {
    let mut dir = settings.output_root.clone();
    if group.use_group_dir() {
        dir.push(group.name().as_str());
    }
    dir.push(name.as_str());
    dir.clean()
}

/// Split a baselineSource attribute into group and scenario names
fn split_baseline_source(source: &str) -> Result<(Ustr, Ustr), Error> {
    match source.split('/').collect::<Vec<_>>()[..] {
        [group, scenario] if !group.is_empty() && !scenario.is_empty() => {
            Ok((Ustr::from(group), Ustr::from(scenario)))
        }
        _ => Err(Error::InvalidBaselineSource(source.to_string())),
    }
}

/// Which baseline, if any, the scenario described by `target` derives from,
/// and the group of that baseline.  A scenario derives from the baseline of
/// its group.  A baseline derives from the baseline named by its group's
/// baselineSource, if any.
fn resolve_parent<'s>(
    setup: &'s ScenarioSetup,
    group: &'s ScenarioGroup,
    target: &EditorTarget,
) -> Result<Option<(&'s ScenarioGroup, EditorTarget)>, Error> {
    if target.scenario.is_some() {
        group.get_final_scenario(&target.baseline)?;
        return Ok(Some((
            group,
            EditorTarget {
                baseline: target.baseline,
                scenario: None,
                group: Some(group.name()),
            },
        )));
    }

    let Some(source) = group.baseline_source() else {
        return Ok(None);
    };
    let (group_name, baseline) = split_baseline_source(source)?;
    let parent_group = setup.group(&group_name)?;
    if !parent_group.get_final_scenario(&baseline)?.is_baseline() {
        return Err(Error::NotABaseline {
            group: group_name,
            scenario: baseline,
        });
    }
    Ok(Some((
        parent_group,
        EditorTarget {
            baseline,
            scenario: None,
            group: Some(group_name),
        },
    )))
}

impl<'a> ScenarioRunner<'a> {
    /// Create the editor for `target`, and resolve its directories and
    /// parent.  Fails if the group or scenario do not exist.
    pub fn new(
        setup: Rc<ScenarioSetup>,
        settings: &'a Settings,
        registry: &EditorRegistry,
        target: EditorTarget,
    ) -> Result<Self, Error> {
        let editor = registry.create(&settings.editor, target.clone())?;
        let (scenario_dir, parent) = {
            let group = setup.resolve_group(&*editor)?;
            setup.resolve_scenario(&*editor)?;
            let dir = output_dir(settings, group, target.name());
            let parent = match resolve_parent(&setup, group, &target)? {
                None => None,
                Some((pgroup, ptarget)) => {
                    let pdir = output_dir(settings, pgroup, ptarget.baseline);
                    info!(
                        scenario = target.name().as_str(),
                        parent = ptarget.baseline.as_str(),
                        group = pgroup.name().as_str(),
                        "parent baseline"
                    );
                    Some(Parent {
                        target: ptarget,
                        scenario_dir: pdir,
                    })
                }
            };
            (dir, parent)
        };

        let baseline_dir = parent
            .as_ref()
            .map_or(&scenario_dir, |p| &p.scenario_dir);
        let dirs = TemplateContext::with_directories(
            &scenario_dir.to_string_lossy(),
            &baseline_dir.to_string_lossy(),
        );
        debug!(?dirs, "directories");

        Ok(ScenarioRunner {
            setup,
            settings,
            editor,
            parent,
            scenario_dir,
            dirs,
        })
    }

    pub fn scenario_dir(&self) -> &Path {
        &self.scenario_dir
    }

    /// The values for {scenarioDir} and {baselineDir}
    pub fn directories(&self) -> &TemplateContext {
        &self.dirs
    }

    pub fn parent(&self) -> Option<&Parent> {
        self.parent.as_ref()
    }

    pub fn editor(&self) -> &dyn ConfigEditor {
        self.editor.as_ref()
    }

    /// Run the static actions.  Monte-Carlo baselines first get the
    /// component that lists the values of the trial.  The expanded setup is
    /// then saved if requested.
    pub fn setup_static(&mut self) -> Result<(), Error> {
        if self.settings.mcs_mode && self.parent.is_none() {
            let path = self.scenario_dir.join(MCS_VALUES_FILE);
            self.editor
                .add_scenario_component(MCS_VALUES, &path.to_string_lossy())?;
        }

        self.setup
            .run(self.editor.as_mut(), &self.dirs, Phase::Static)?;

        if let Some(output) = &self.settings.setup_output {
            info!(path = %output.display(), "writing expanded setup");
            std::fs::write(output, self.setup.write_xml()?)
                .map_err(|e| Error::IoWithPath(e, output.clone()))?;
        }
        Ok(())
    }

    /// Run the actions that depend on the directories created for the run
    pub fn setup_dynamic(&mut self) -> Result<(), Error> {
        self.setup
            .run(self.editor.as_mut(), &self.dirs, Phase::Dynamic)
    }
}
