/// The configuration editor is the collaborator that actually modifies a
/// scenario's configuration.  Setup documents only reach it through the
/// narrow `ConfigEditor` interface: four mutations of the list of scenario
/// components, plus a set of named capabilities that `<function>` actions
/// can invoke.
///
/// Editors are created by key through an `EditorRegistry`, so that the
/// implementation used for a run is selected from the settings.
use crate::args::{Arguments, Literal};
use crate::errors::Error;
use std::collections::{BTreeMap, HashMap};
use ustr::{Ustr, UstrMap};

/// A named operation an editor makes available to `<function>` actions
pub type Capability<E> = fn(&mut E, &Arguments) -> Result<(), Error>;

/// The set of capabilities of one editor type, by name
pub struct Capabilities<E> {
    map: UstrMap<Capability<E>>,
}

impl<E> Default for Capabilities<E> {
    fn default() -> Self {
        Capabilities {
            map: UstrMap::default(),
        }
    }
}

impl<E> Capabilities<E> {
    pub fn register(mut self, name: &str, func: Capability<E>) -> Self {
        self.map.insert(Ustr::from(name), func);
        self
    }

    pub fn get(&self, name: &str) -> Option<Capability<E>> {
        self.map.get(&Ustr::from(name)).copied()
    }

    /// Call a capability, failing if it doesn't exist
    pub fn invoke(
        &self,
        editor: &mut E,
        name: &str,
        args: &Arguments,
    ) -> Result<(), Error> {
        match self.get(name) {
            None => Err(Error::UnknownFunction(Ustr::from(name))),
            Some(func) => func(editor, args),
        }
    }
}

pub trait ConfigEditor {
    /// The group requested for this run, if any
    fn group_name(&self) -> Option<Ustr>;

    /// The (non-baseline) scenario being set up, if any
    fn scenario(&self) -> Option<Ustr>;

    /// The baseline of the scenario, or the scenario itself when it is a
    /// baseline.
    fn baseline(&self) -> Ustr;

    fn insert_scenario_component(
        &mut self,
        name: &str,
        content: &str,
        after: Option<&str>,
    ) -> Result<(), Error>;

    fn add_scenario_component(
        &mut self,
        name: &str,
        content: &str,
    ) -> Result<(), Error>;

    fn update_scenario_component(
        &mut self,
        name: &str,
        content: &str,
    ) -> Result<(), Error>;

    fn delete_scenario_component(&mut self, name: &str) -> Result<(), Error>;

    /// Whether `name` is a capability that `<function>` can call
    fn has_capability(&self, name: &str) -> bool;

    fn invoke(&mut self, name: &str, args: &Arguments) -> Result<(), Error>;

    /// A description of the resulting configuration, for reporting
    fn summary(&self) -> String {
        String::new()
    }
}

/// What an editor is created for
#[derive(Clone, Debug, PartialEq)]
pub struct EditorTarget {
    pub baseline: Ustr,
    pub scenario: Option<Ustr>,
    pub group: Option<Ustr>,
}

impl Default for EditorTarget {
    fn default() -> Self {
        EditorTarget {
            baseline: Ustr::from(""),
            scenario: None,
            group: None,
        }
    }
}

impl EditorTarget {
    /// The name of the scenario this editor configures
    pub fn name(&self) -> Ustr {
        self.scenario.unwrap_or(self.baseline)
    }
}

lazy_static::lazy_static! {
    static ref COMPONENT_EDITOR_CAPABILITIES: Capabilities<ComponentEditor> =
        Capabilities::default()
            .register("setConfigValue", ComponentEditor::set_config_value)
            .register("deleteConfigValue", ComponentEditor::delete_config_value)
            .register("renameComponent", ComponentEditor::rename_component);
}

/// The default editor: it keeps the ordered list of scenario components and
/// a set of configuration values in memory.
#[derive(Debug, Default)]
pub struct ComponentEditor {
    target: EditorTarget,
    components: Vec<(String, String)>, // name, content
    values: BTreeMap<String, String>,
}

fn to_editor_error(err: String) -> Error {
    Error::Editor(err)
}

impl ComponentEditor {
    pub fn new(target: EditorTarget) -> Self {
        ComponentEditor {
            target,
            ..Default::default()
        }
    }

    pub fn components(&self) -> &[(String, String)] {
        &self.components
    }

    pub fn config_value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn position(&self, name: &str) -> Result<usize, Error> {
        self.components
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| Error::UnknownComponent(name.to_string()))
    }

    fn check_new(&self, name: &str) -> Result<(), Error> {
        if self.components.iter().any(|(n, _)| n == name) {
            Err(Error::Editor(format!(
                "Component \"{}\" already exists",
                name
            )))
        } else {
            Ok(())
        }
    }

    /// setConfigValue(name, value)
    fn set_config_value(&mut self, args: &Arguments) -> Result<(), Error> {
        let name = args.require(0, "name").map_err(to_editor_error)?;
        let value = args.require(1, "value").map_err(to_editor_error)?;
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// deleteConfigValue(name)
    fn delete_config_value(&mut self, args: &Arguments) -> Result<(), Error> {
        let name = args.require(0, "name").map_err(to_editor_error)?;
        self.values.remove(&name.to_string());
        Ok(())
    }

    /// renameComponent(old, new)
    fn rename_component(&mut self, args: &Arguments) -> Result<(), Error> {
        let old = args.require(0, "old").map_err(to_editor_error)?;
        let new = match args.require(1, "new").map_err(to_editor_error)? {
            Literal::Str(s) => s.clone(),
            lit => lit.to_string(),
        };
        let idx = self.position(&old.to_string())?;
        self.check_new(&new)?;
        self.components[idx].0 = new;
        Ok(())
    }
}

impl ConfigEditor for ComponentEditor {
    fn group_name(&self) -> Option<Ustr> {
        self.target.group
    }

    fn scenario(&self) -> Option<Ustr> {
        self.target.scenario
    }

    fn baseline(&self) -> Ustr {
        self.target.baseline
    }

    /// Insert after the component `after`, or first if not specified
    fn insert_scenario_component(
        &mut self,
        name: &str,
        content: &str,
        after: Option<&str>,
    ) -> Result<(), Error> {
        self.check_new(name)?;
        let idx = match after {
            None => 0,
            Some(a) => self.position(a)? + 1,
        };
        self.components
            .insert(idx, (name.to_string(), content.to_string()));
        Ok(())
    }

    fn add_scenario_component(
        &mut self,
        name: &str,
        content: &str,
    ) -> Result<(), Error> {
        self.check_new(name)?;
        self.components.push((name.to_string(), content.to_string()));
        Ok(())
    }

    fn update_scenario_component(
        &mut self,
        name: &str,
        content: &str,
    ) -> Result<(), Error> {
        let idx = self.position(name)?;
        self.components[idx].1 = content.to_string();
        Ok(())
    }

    fn delete_scenario_component(&mut self, name: &str) -> Result<(), Error> {
        let idx = self.position(name)?;
        self.components.remove(idx);
        Ok(())
    }

    fn has_capability(&self, name: &str) -> bool {
        COMPONENT_EDITOR_CAPABILITIES.get(name).is_some()
    }

    fn invoke(&mut self, name: &str, args: &Arguments) -> Result<(), Error> {
        COMPONENT_EDITOR_CAPABILITIES.invoke(self, name, args)
    }

    fn summary(&self) -> String {
        let mut lines = vec![format!("scenario {}", self.target.name())];
        for (name, content) in &self.components {
            lines.push(format!("   component {}: {}", name, content));
        }
        for (name, value) in &self.values {
            lines.push(format!("   value {} = {}", name, value));
        }
        lines.join("\n")
    }
}

pub type EditorConstructor = fn(EditorTarget) -> Box<dyn ConfigEditor>;

/// Selects the editor implementation from a configuration key
pub struct EditorRegistry {
    constructors: HashMap<String, EditorConstructor>,
}

pub const DEFAULT_EDITOR: &str = "default";

impl Default for EditorRegistry {
    fn default() -> Self {
        let mut r = EditorRegistry {
            constructors: HashMap::new(),
        };
        r.register(DEFAULT_EDITOR, |target| Box::new(ComponentEditor::new(target)));
        r
    }
}

impl EditorRegistry {
    pub fn register(&mut self, key: &str, constructor: EditorConstructor) {
        self.constructors.insert(key.to_string(), constructor);
    }

    pub fn create(
        &self,
        key: &str,
        target: EditorTarget,
    ) -> Result<Box<dyn ConfigEditor>, Error> {
        self.constructors
            .get(key)
            .map(|ctor| ctor(target))
            .ok_or_else(|| Error::UnknownEditor(key.to_string()))
    }

    /// The registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut k: Vec<&str> =
            self.constructors.keys().map(String::as_str).collect();
        k.sort();
        k
    }
}


#[cfg(test)]
mod tests {
    use crate::args::Arguments;
    use crate::editor::{
        ComponentEditor, ConfigEditor, EditorRegistry, EditorTarget,
        DEFAULT_EDITOR,
    };
    use crate::errors::Error;
    use ustr::Ustr;

    fn names(ed: &ComponentEditor) -> Vec<&str> {
        ed.components().iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn component_mutations() -> Result<(), Error> {
        let mut ed = ComponentEditor::new(EditorTarget::default());
        ed.add_scenario_component("a", "a.xml")?;
        ed.add_scenario_component("c", "c.xml")?;
        ed.insert_scenario_component("b", "b.xml", Some("a"))?;
        ed.insert_scenario_component("first", "0.xml", None)?;
        assert_eq!(names(&ed), ["first", "a", "b", "c"]);

        ed.update_scenario_component("b", "b2.xml")?;
        assert_eq!(ed.components()[2].1, "b2.xml");
        ed.delete_scenario_component("first")?;
        assert_eq!(names(&ed), ["a", "b", "c"]);

        assert!(ed.add_scenario_component("a", "dup.xml").is_err());
        assert!(matches!(
            ed.update_scenario_component("zz", "x"),
            Err(Error::UnknownComponent(_))
        ));
        assert!(ed.insert_scenario_component("d", "d", Some("zz")).is_err());
        assert!(ed.delete_scenario_component("zz").is_err());
        Ok(())
    }

    #[test]
    fn capabilities() -> Result<(), Error> {
        let mut ed = ComponentEditor::new(EditorTarget::default());
        assert!(ed.has_capability("setConfigValue"));
        assert!(!ed.has_capability("eval"));

        ed.invoke(
            "setConfigValue",
            &Arguments::parse("'stop-year', 2050").map_err(Error::Editor)?,
        )?;
        assert_eq!(ed.config_value("stop-year"), Some("2050"));

        ed.add_scenario_component("a", "a.xml")?;
        ed.invoke(
            "renameComponent",
            &Arguments::parse("old='a', new='b'").map_err(Error::Editor)?,
        )?;
        assert_eq!(names(&ed), ["b"]);

        assert!(matches!(
            ed.invoke("eval", &Arguments::default()),
            Err(Error::UnknownFunction(_))
        ));
        assert!(ed.invoke("setConfigValue", &Arguments::default()).is_err());
        Ok(())
    }

    #[test]
    fn registry() -> Result<(), Error> {
        let mut reg = EditorRegistry::default();
        let target = EditorTarget {
            baseline: Ustr::from("base"),
            scenario: Some(Ustr::from("tax")),
            group: None,
        };
        let ed = reg.create(DEFAULT_EDITOR, target.clone())?;
        assert_eq!(ed.scenario(), Some(Ustr::from("tax")));
        assert_eq!(ed.baseline(), Ustr::from("base"));
        assert!(reg.create("gcam", target).is_err());

        reg.register("other", |target| Box::new(ComponentEditor::new(target)));
        assert_eq!(reg.keys(), ["default", "other"]);
        Ok(())
    }
}
