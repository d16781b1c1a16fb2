use crate::actions::{escape, Phase};
use crate::editor::ConfigEditor;
use crate::errors::Error;
use crate::files::File;
use crate::iterator::ValueIterator;
use crate::scenario::{insert_expanded, Scenario, ScenarioGroup};
use crate::template::{iterate_list, split_iterator_names, TemplateContext};
use crate::xml::{parse_document, XmlElement};
use indexmap::IndexMap;
use path_clean::PathClean;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};
use ustr::Ustr;

/// A parsed and fully expanded setup document.
#[derive(Debug)]
pub struct ScenarioSetup {
    path: PathBuf,
    default_group: Option<Ustr>,
    iterators: IndexMap<Ustr, ValueIterator>,
    context: TemplateContext,
    groups: IndexMap<Ustr, ScenarioGroup>,
}

impl ScenarioSetup {
    /// Load the document from its root element, and expand all groups and
    /// scenarios.
    pub fn from_node(root: &XmlElement, path: &Path) -> Result<Self, Error> {
        let mut setup = ScenarioSetup {
            path: path.to_owned(),
            default_group: root.get_non_empty("defaultGroup").map(Ustr::from),
            iterators: IndexMap::new(),
            context: TemplateContext::new(),
            groups: IndexMap::new(),
        };

        let mut templates = Vec::new();
        for child in &root.children {
            match child.tag.as_str() {
                "iterator" => {
                    let it = ValueIterator::from_node(child)?;
                    setup.iterators.insert(it.name(), it);
                }
                "scenarioGroup" => templates.push(child),
                _ => return Err(child.locate(Error::UnknownTag(child.tag))),
            }
        }

        setup.expand_groups(&templates)?;
        info!(
            path = %setup.path.display(),
            groups = setup.groups.len(),
            scenarios = setup
                .groups
                .values()
                .map(|g| g.scenarios().len())
                .sum::<usize>(),
            "setup expanded"
        );
        Ok(setup)
    }

    /// Parse a setup document
    pub fn parse_file(file: &File) -> Result<Self, Error> {
        let root = parse_document(file)?;
        Self::from_node(&root, file.path()).map_err(|e| e.with_path(file.path()))
    }

    /// Expand each group template once per combination of its iterators.
    /// Group names may themselves reference iterators.
    fn expand_groups(&mut self, templates: &[&XmlElement]) -> Result<(), Error> {
        let iterators = &self.iterators;
        let groups = &mut self.groups;
        for node in templates {
            let names = split_iterator_names(node.get("iterator"));
            iterate_list(iterators, &mut self.context, &names, &mut |ctx| {
                let mut group = ScenarioGroup::from_node(node)?;
                group.expand_scenarios(iterators, ctx)?;
                insert_expanded(groups, group.name(), group);
                Ok(())
            })
            .map_err(|e| node.locate(e))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_iterator(&self, name: &str) -> Result<&ValueIterator, Error> {
        let name = Ustr::from(name);
        self.iterators.get(&name).ok_or(Error::UnknownIterator(name))
    }

    /// The declared iterators, in document order
    pub fn iterators(&self) -> impl Iterator<Item = &ValueIterator> {
        self.iterators.values()
    }

    /// The final groups, in the order they were first expanded
    pub fn groups(&self) -> &IndexMap<Ustr, ScenarioGroup> {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Result<&ScenarioGroup, Error> {
        let name = Ustr::from(name);
        self.groups.get(&name).ok_or(Error::UnknownGroup(name))
    }

    /// The group used when none is requested: the one named by the root's
    /// defaultGroup attribute, or else the first group marked as default.
    pub fn default_group(&self) -> Option<Ustr> {
        self.default_group.or_else(|| {
            self.groups
                .values()
                .find(|g| g.is_default())
                .map(ScenarioGroup::name)
        })
    }

    /// The group requested by the editor, or the default one
    pub fn resolve_group(
        &self,
        editor: &dyn ConfigEditor,
    ) -> Result<&ScenarioGroup, Error> {
        let name = editor
            .group_name()
            .or_else(|| self.default_group())
            .ok_or(Error::NoDefaultGroup)?;
        self.group(&name)
    }

    /// The scenario the editor is configuring: its scenario when it has
    /// one, its baseline otherwise.
    pub fn resolve_scenario(
        &self,
        editor: &dyn ConfigEditor,
    ) -> Result<&Scenario, Error> {
        let group = self.resolve_group(editor)?;
        let name = editor.scenario().unwrap_or_else(|| editor.baseline());
        group.get_final_scenario(&name)
    }

    /// Run the actions of the editor's scenario for one phase
    pub fn run(
        &self,
        editor: &mut dyn ConfigEditor,
        dirs: &TemplateContext,
        phase: Phase,
    ) -> Result<(), Error> {
        let scenario = self.resolve_scenario(&*editor)?;
        debug!(scenario = scenario.name().as_str(), %phase, "running setup");
        scenario.run(editor, dirs, phase)
    }

    /// The expanded tree, without any iterator, in the same vocabulary as
    /// the input document.
    pub fn write_xml(&self) -> Result<String, Error> {
        let mut out = String::new();
        match self.default_group {
            None => writeln!(out, "<setup>")?,
            Some(g) => writeln!(out, "<setup defaultGroup=\"{}\">", escape(&g))?,
        }
        for group in self.groups.values() {
            group.write_xml(&mut out, 1)?;
        }
        writeln!(out, "</setup>")?;
        Ok(out)
    }
}

/// Setup documents already parsed, by path.  Parsing the same path again
/// returns the same instance.
#[derive(Default)]
pub struct SetupCache {
    docs: HashMap<PathBuf, Rc<ScenarioSetup>>,
}

impl SetupCache {
    pub fn parse(&mut self, path: &Path) -> Result<Rc<ScenarioSetup>, Error> {
        let key = path.to_path_buf().clean();
        if let Some(setup) = self.docs.get(&key) {
            debug!(path = %key.display(), "setup cache hit");
            return Ok(Rc::clone(setup));
        }
        debug!(path = %key.display(), "parsing setup");
        let file = File::new(&key)?;
        let setup = Rc::new(ScenarioSetup::parse_file(&file)?);
        self.docs.insert(key, Rc::clone(&setup));
        Ok(setup)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }
}
