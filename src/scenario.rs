use crate::actions::{escape, Action, Phase, TAB};
use crate::editor::ConfigEditor;
use crate::errors::Error;
use crate::iterator::ValueIterator;
use crate::template::{iterate_list, split_iterator_names, TemplateContext};
use crate::xml::XmlElement;
use indexmap::IndexMap;
use std::fmt::Write;
use tracing::{debug, trace};
use ustr::Ustr;

/// Insert the result of an expansion.  When two expansions produce the same
/// name, the later one replaces the earlier one but keeps its position.
pub(crate) fn insert_expanded<T>(map: &mut IndexMap<Ustr, T>, name: Ustr, value: T) {
    if map.insert(name, value).is_some() {
        debug!(%name, "expansion replaces an existing entry");
    }
}

/// One experiment configuration: an ordered list of actions.
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    name: Ustr,
    is_baseline: bool,
    iterators: Vec<Ustr>,
    actions: Vec<Action>,
}

impl Scenario {
    pub fn from_node(node: &XmlElement) -> Result<Self, Error> {
        let load = || -> Result<Self, Error> {
            Ok(Scenario {
                name: Ustr::from(node.require("name")?),
                is_baseline: node.get_bool("baseline", false)?,
                iterators: split_iterator_names(node.get("iterator")),
                actions: node
                    .children
                    .iter()
                    .map(Action::from_node)
                    .collect::<Result<Vec<_>, _>>()?,
            })
        };
        load().map_err(|e| node.locate(e))
    }

    pub fn name(&self) -> Ustr {
        self.name
    }

    pub fn is_baseline(&self) -> bool {
        self.is_baseline
    }

    /// The iterators this scenario template is expanded over
    pub fn iterators(&self) -> &[Ustr] {
        &self.iterators
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Turn a template into a final scenario, by replacing the iterator
    /// values in its name and in all its actions.  The directories are
    /// only replaced when the scenario is run.
    pub fn format_content(&mut self, ctx: &TemplateContext) -> Result<(), Error> {
        self.name = Ustr::from(ctx.format_name(&self.name)?.as_str());
        for action in &mut self.actions {
            action.format_content(ctx)?;
        }
        Ok(())
    }

    /// Run all actions for the given phase, in order.  The first error
    /// aborts the run.
    pub fn run(
        &self,
        editor: &mut dyn ConfigEditor,
        dirs: &TemplateContext,
        phase: Phase,
    ) -> Result<(), Error> {
        trace!(scenario = self.name.as_str(), %phase, "run scenario");
        for action in &self.actions {
            action.run(editor, dirs, phase)?;
        }
        Ok(())
    }

    pub fn write_xml(&self, out: &mut String, indent: usize) -> Result<(), Error> {
        writeln!(
            out,
            "{}<scenario name=\"{}\" baseline=\"{}\">",
            TAB.repeat(indent),
            escape(&self.name),
            u8::from(self.is_baseline),
        )?;
        for action in &self.actions {
            action.write_xml(out, indent + 1)?;
        }
        writeln!(out, "{}</scenario>", TAB.repeat(indent))?;
        Ok(())
    }
}

/// A named collection of related scenarios.
#[derive(Debug)]
pub struct ScenarioGroup {
    name: Ustr,
    use_group_dir: bool,
    is_default: bool,
    iterators: Vec<Ustr>,
    baseline_source: Option<String>, // "groupName/scenarioName"
    templates: Vec<XmlElement>,      // the <scenario> nodes
    scenarios: IndexMap<Ustr, Scenario>,
}

impl ScenarioGroup {
    pub fn from_node(node: &XmlElement) -> Result<Self, Error> {
        if let Some(child) =
            node.children.iter().find(|c| c.tag.as_str() != "scenario")
        {
            return Err(child.locate(Error::UnknownTag(child.tag)));
        }
        let load = || -> Result<Self, Error> {
            Ok(ScenarioGroup {
                name: Ustr::from(node.require("name")?),
                use_group_dir: node.get_bool("useGroupDir", false)?,
                is_default: node.get_bool("default", false)?,
                iterators: split_iterator_names(node.get("iterator")),
                baseline_source: node
                    .get_non_empty("baselineSource")
                    .map(String::from),
                templates: node.children_named("scenario").cloned().collect(),
                scenarios: IndexMap::new(),
            })
        };
        load().map_err(|e| node.locate(e))
    }

    pub fn name(&self) -> Ustr {
        self.name
    }

    pub fn use_group_dir(&self) -> bool {
        self.use_group_dir
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// The iterators this group template is expanded over
    pub fn iterators(&self) -> &[Ustr] {
        &self.iterators
    }

    pub fn baseline_source(&self) -> Option<&str> {
        self.baseline_source.as_deref()
    }

    /// The final scenarios, in the order they were first expanded
    pub fn scenarios(&self) -> &IndexMap<Ustr, Scenario> {
        &self.scenarios
    }

    /// Lookup one of the final (expanded) scenarios
    pub fn get_final_scenario(&self, name: &str) -> Result<&Scenario, Error> {
        let name = Ustr::from(name);
        self.scenarios.get(&name).ok_or(Error::UnknownScenario {
            group: self.name,
            scenario: name,
        })
    }

    /// Replace the iterator values in the group's own attributes, then
    /// expand each of its scenario templates, once per combination of the
    /// values of its iterators.
    pub fn expand_scenarios(
        &mut self,
        iterators: &IndexMap<Ustr, ValueIterator>,
        ctx: &mut TemplateContext,
    ) -> Result<(), Error> {
        self.name = Ustr::from(ctx.format_name(&self.name)?.as_str());
        self.baseline_source = self
            .baseline_source
            .as_deref()
            .map(|src| ctx.format_name(src))
            .transpose()?;

        let finals = &mut self.scenarios;
        for node in &self.templates {
            let names = split_iterator_names(node.get("iterator"));
            iterate_list(iterators, ctx, &names, &mut |ctx| {
                let mut scenario = Scenario::from_node(node)?;
                scenario.format_content(ctx)?;
                insert_expanded(finals, scenario.name(), scenario);
                Ok(())
            })
            .map_err(|e| node.locate(e))?;
        }
        Ok(())
    }

    pub fn write_xml(&self, out: &mut String, indent: usize) -> Result<(), Error> {
        writeln!(out)?;
        write!(
            out,
            "{}<scenarioGroup name=\"{}\" useGroupDir=\"{}\"",
            TAB.repeat(indent),
            escape(&self.name),
            u8::from(self.use_group_dir),
        )?;
        if self.is_default {
            write!(out, " default=\"1\"")?;
        }
        if let Some(src) = &self.baseline_source {
            write!(out, " baselineSource=\"{}\"", escape(src))?;
        }
        writeln!(out, ">")?;
        for scenario in self.scenarios.values() {
            scenario.write_xml(out, indent + 1)?;
        }
        writeln!(out, "{}</scenarioGroup>", TAB.repeat(indent))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::actions::Phase;
    use crate::editor::testing::RecordingEditor;
    use crate::errors::Error;
    use crate::files::File;
    use crate::iterator::ValueIterator;
    use crate::scenario::ScenarioGroup;
    use crate::template::TemplateContext;
    use crate::xml::parse_document;
    use indexmap::IndexMap;
    use ustr::Ustr;

    fn expand(
        s: &str,
        lists: &[(&str, &str)],
    ) -> Result<ScenarioGroup, Error> {
        let mut iterators = IndexMap::new();
        for (name, values) in lists {
            let it = ValueIterator::new_list(Ustr::from(*name), values)?;
            iterators.insert(it.name(), it);
        }
        let node = parse_document(&File::new_from_str(s))?;
        let mut group = ScenarioGroup::from_node(&node)?;
        group.expand_scenarios(&iterators, &mut TemplateContext::new())?;
        Ok(group)
    }

    #[test]
    fn cross_product_names() -> Result<(), Error> {
        let group = expand(
            "<scenarioGroup name='g'>
                <scenario name='base' baseline='1'/>
                <scenario name='s-{X}-{Y}' iterator='X,Y'>
                   <add name='f'>{X}{Y}.xml</add>
                </scenario>
             </scenarioGroup>",
            &[("X", "1,2"), ("Y", "a,b")],
        )?;
        let names: Vec<String> =
            group.scenarios().keys().map(|n| n.to_string()).collect();
        assert_eq!(names, ["base", "s-1-a", "s-1-b", "s-2-a", "s-2-b"]);
        assert!(group.get_final_scenario("base")?.is_baseline());

        let mut ed = RecordingEditor::new(None, "base", Some("s-2-a"));
        group.get_final_scenario("s-2-a")?.run(
            &mut ed,
            &TemplateContext::with_directories("a", "b"),
            Phase::Static,
        )?;
        assert_eq!(ed.calls, ["add(f, 2a.xml)"]);
        Ok(())
    }

    #[test]
    fn name_collision_keeps_last() -> Result<(), Error> {
        let group = expand(
            "<scenarioGroup name='g'>
                <scenario name='same' iterator='X'>
                   <add name='f'>{X}.xml</add>
                </scenario>
             </scenarioGroup>",
            &[("X", "1,2,3")],
        )?;
        assert_eq!(group.scenarios().len(), 1);
        let mut ed = RecordingEditor::new(None, "same", None);
        group.get_final_scenario("same")?.run(
            &mut ed,
            &TemplateContext::with_directories("a", "b"),
            Phase::Static,
        )?;
        assert_eq!(ed.calls, ["add(f, 3.xml)"]);
        Ok(())
    }

    #[test]
    fn collision_keeps_position() -> Result<(), Error> {
        let group = expand(
            "<scenarioGroup name='g'>
                <scenario name='s-{X}' iterator='X'>
                   <add name='f'>first-{X}</add>
                </scenario>
                <scenario name='other'/>
                <scenario name='s-1'>
                   <add name='f'>second</add>
                </scenario>
             </scenarioGroup>",
            &[("X", "1,2")],
        )?;
        let names: Vec<String> =
            group.scenarios().keys().map(|n| n.to_string()).collect();
        assert_eq!(names, ["s-1", "s-2", "other"]);

        let mut ed = RecordingEditor::new(None, "s-1", None);
        group.get_final_scenario("s-1")?.run(
            &mut ed,
            &TemplateContext::with_directories("a", "b"),
            Phase::Static,
        )?;
        assert_eq!(ed.calls, ["add(f, second)"]);
        Ok(())
    }

    #[test]
    fn literal_braces_in_content() -> Result<(), Error> {
        let group = expand(
            "<scenarioGroup name='g'>
                <scenario name='s{{{X}}}' iterator='X'>
                   <add name='f'>{{a}}/{X}/{scenarioDir}</add>
                </scenario>
             </scenarioGroup>",
            &[("X", "1")],
        )?;
        let scenario = group.get_final_scenario("s{1}")?;
        let mut ed = RecordingEditor::new(None, "s{1}", None);
        scenario.run(
            &mut ed,
            &TemplateContext::with_directories("out", "b"),
            Phase::Static,
        )?;
        assert_eq!(ed.calls, ["add(f, {a}/1/out)"]);
        Ok(())
    }

    #[test]
    fn failing_action_aborts() -> Result<(), Error> {
        let group = expand(
            "<scenarioGroup name='g'>
                <scenario name='s'>
                   <add name='a'>a</add>
                   <function name='fail'/>
                   <add name='b'>b</add>
                </scenario>
             </scenarioGroup>",
            &[],
        )?;
        let mut ed = RecordingEditor::new(None, "s", None);
        let res = group.get_final_scenario("s")?.run(
            &mut ed,
            &TemplateContext::with_directories("a", "b"),
            Phase::Static,
        );
        assert!(res.is_err());
        assert_eq!(ed.calls, ["add(a, a)"]);
        Ok(())
    }

    fn expand_error(s: &str) -> Error {
        match expand(s, &[]) {
            Ok(g) => panic!("expected an error, got group {}", g.name()),
            Err(e) => e,
        }
    }

    #[test]
    fn errors() {
        assert!(matches!(
            expand_error("<scenarioGroup name='g'><bad/></scenarioGroup>")
                .unlocated(),
            Error::UnknownTag(_)
        ));
        let err = expand_error(
            "<scenarioGroup name='g'>
                <scenario name='s-{Z}' iterator='Z'/>
             </scenarioGroup>",
        );
        assert!(matches!(err.unlocated(), Error::UnknownIterator(_)));
        assert!(matches!(err, Error::AtLine { line: 2, .. }));

        let err = expand_error(
            "<scenarioGroup name='g'>
                <scenario name='s'>
                   <add name='a'>{missing}</add>
                </scenario>
             </scenarioGroup>",
        );
        assert_eq!(
            err.to_string(),
            "line 2: Unknown placeholder {missing} in \"{missing}\""
        );
        match expand("<scenarioGroup name='g'/>", &[]) {
            Ok(g) => assert!(matches!(
                g.get_final_scenario("x"),
                Err(Error::UnknownScenario { .. })
            )),
            Err(e) => panic!("unexpected {}", e),
        }
    }
}
