/// The actions of a scenario, each one a child element of <scenario>:
///     <insert name="..." after="...">content</insert>
///     <add name="...">content</add>
///     <replace name="...">content</replace>
///     <delete name="..."/>
///     <function name="...">literal arguments</function>
///     <if value1="..." value2="a,b" matches="1">...nested actions...</if>
/// All but <if> accept a `dynamic` attribute, which selects the phase in
/// which they run.  <if> is evaluated in both phases, and its children are
/// filtered individually.
use crate::args::Arguments;
use crate::editor::ConfigEditor;
use crate::errors::Error;
use crate::template::{Formatted, TemplateContext};
use crate::xml::XmlElement;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::trace;
use ustr::Ustr;

pub(crate) const TAB: &str = "   ";

/// Scenarios are set up in two passes.  Dynamic actions depend on
/// directories that only exist once the static pass has been run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Static,
    Dynamic,
}

impl Phase {
    pub fn from_dynamic(dynamic: bool) -> Self {
        if dynamic {
            Phase::Dynamic
        } else {
            Phase::Static
        }
    }

    pub fn is_dynamic(self) -> bool {
        self == Phase::Dynamic
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Static => write!(f, "static"),
            Phase::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Attributes shared by all actions except <if>
#[derive(Clone, Debug, PartialEq)]
pub struct ActionBase {
    pub tag: Ustr,
    pub name: Formatted,
    pub content: Option<Formatted>,
    pub phase: Phase,
}

/// <if>: runs its children only when `value1` is (or, with
/// matches="0", is not) one of the comma-separated `value2`.
#[derive(Clone, Debug, PartialEq)]
pub struct Conditional {
    pub value1: Formatted,
    pub value2: Formatted,
    pub matches: bool,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Insert {
        base: ActionBase,
        after: Option<Formatted>,
    },
    Add(ActionBase),
    Replace(ActionBase),
    Delete(ActionBase),
    Function(ActionBase),
    If(Conditional),
}

type ActionConstructor = fn(&XmlElement) -> Result<Action, Error>;

lazy_static::lazy_static! {
    static ref ACTION_TAGS: HashMap<&'static str, ActionConstructor> = {
        let mut m: HashMap<&'static str, ActionConstructor> = HashMap::new();
        m.insert("insert", |node| {
            Ok(Action::Insert {
                base: ActionBase::from_node(node, true)?,
                after: node.get_non_empty("after").map(Formatted::new),
            })
        });
        m.insert("add", |node| {
            Ok(Action::Add(ActionBase::from_node(node, true)?))
        });
        m.insert("replace", |node| {
            Ok(Action::Replace(ActionBase::from_node(node, true)?))
        });
        m.insert("delete", |node| {
            Ok(Action::Delete(ActionBase::from_node(node, false)?))
        });
        m.insert("function", |node| {
            Ok(Action::Function(ActionBase::from_node(node, false)?))
        });
        m.insert("if", |node| Ok(Action::If(Conditional::from_node(node)?)));
        m
    };
}

/// Escape text for inclusion in an XML document
pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl ActionBase {
    fn from_node(node: &XmlElement, needs_content: bool) -> Result<Self, Error> {
        let name = node.require("name")?;
        if needs_content && node.text.is_none() {
            return Err(Error::MissingContent(node.tag, name.to_string()));
        }
        Ok(ActionBase {
            tag: node.tag,
            name: Formatted::new(name),
            content: node.text.as_deref().map(Formatted::new),
            phase: Phase::from_dynamic(node.get_bool("dynamic", false)?),
        })
    }

    fn format_content(&mut self, ctx: &TemplateContext) -> Result<(), Error> {
        self.name.format(ctx)?;
        if let Some(c) = &mut self.content {
            c.format(ctx)?;
        }
        Ok(())
    }

    /// The content, with the directories substituted
    fn resolve_content(&self, dirs: &TemplateContext) -> Result<String, Error> {
        match &self.content {
            None => Ok(String::new()),
            Some(c) => c.resolve(dirs),
        }
    }

    fn write_xml(
        &self,
        out: &mut String,
        indent: usize,
        after: Option<&Formatted>,
    ) -> Result<(), Error> {
        write!(
            out,
            "{}<{} name=\"{}\"",
            TAB.repeat(indent),
            self.tag,
            escape(self.name.text())
        )?;
        if let Some(a) = after {
            write!(out, " after=\"{}\"", escape(a.text()))?;
        }
        if self.phase.is_dynamic() {
            write!(out, " dynamic=\"1\"")?;
        }
        match &self.content {
            None => writeln!(out, "/>")?,
            Some(c) => {
                writeln!(out, ">{}</{}>", escape(c.text()), self.tag)?
            }
        }
        Ok(())
    }
}

impl Conditional {
    fn from_node(node: &XmlElement) -> Result<Self, Error> {
        Ok(Conditional {
            value1: Formatted::new(node.require("value1")?),
            value2: Formatted::new(node.require("value2")?),
            matches: node.get_bool("matches", true)?,
            actions: node
                .children
                .iter()
                .map(Action::from_node)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    /// Whether the children should be run
    fn is_active(value1: &str, value2: &str, matches: bool) -> bool {
        value2.split(',').map(str::trim).any(|v| v == value1) == matches
    }
}

impl Action {
    /// Build an action from its element.  The tag selects the kind of
    /// action.
    pub fn from_node(node: &XmlElement) -> Result<Self, Error> {
        match ACTION_TAGS.get(node.tag.as_str()) {
            None => Err(Error::UnknownTag(node.tag)),
            Some(ctor) => ctor(node),
        }
        .map_err(|e| node.locate(e))
    }

    /// Replace placeholders in all text of the action.  Calling this again
    /// with the same context has no effect.
    pub fn format_content(&mut self, ctx: &TemplateContext) -> Result<(), Error> {
        match self {
            Action::Insert { base, after } => {
                base.format_content(ctx)?;
                if let Some(a) = after {
                    a.format(ctx)?;
                }
                Ok(())
            }
            Action::Add(base)
            | Action::Replace(base)
            | Action::Delete(base)
            | Action::Function(base) => base.format_content(ctx),
            Action::If(cond) => {
                cond.value1.format(ctx)?;
                cond.value2.format(ctx)?;
                for a in &mut cond.actions {
                    a.format_content(ctx)?;
                }
                Ok(())
            }
        }
    }

    /// The phase-filtered part of the action, if any
    fn base(&self) -> Option<&ActionBase> {
        match self {
            Action::Insert { base, .. }
            | Action::Add(base)
            | Action::Replace(base)
            | Action::Delete(base)
            | Action::Function(base) => Some(base),
            Action::If(_) => None,
        }
    }

    /// Run the action if it belongs to `phase`.  `dirs` provides the values
    /// of the directory placeholders.
    pub fn run(
        &self,
        editor: &mut dyn ConfigEditor,
        dirs: &TemplateContext,
        phase: Phase,
    ) -> Result<(), Error> {
        if let Action::If(cond) = self {
            let value1 = cond.value1.resolve(dirs)?;
            let value2 = cond.value2.resolve(dirs)?;
            let active = Conditional::is_active(&value1, &value2, cond.matches);
            trace!(%value1, %value2, active, "if");
            if active {
                for a in &cond.actions {
                    a.run(editor, dirs, phase)?;
                }
            }
            return Ok(());
        }

        let base = match self.base() {
            Some(b) if b.phase == phase => b,
            _ => return Ok(()),
        };
        let name = base.name.resolve(dirs)?;
        trace!(tag = base.tag.as_str(), %name, %phase, "run action");

        match self {
            Action::Insert { after, .. } => {
                let after = match after {
                    None => None,
                    Some(a) => Some(a.resolve(dirs)?),
                };
                editor.insert_scenario_component(
                    &name,
                    &base.resolve_content(dirs)?,
                    after.as_deref(),
                )
            }
            Action::Add(_) => {
                editor.add_scenario_component(&name, &base.resolve_content(dirs)?)
            }
            Action::Replace(_) => editor
                .update_scenario_component(&name, &base.resolve_content(dirs)?),
            Action::Delete(_) => editor.delete_scenario_component(&name),
            Action::Function(_) => {
                if !editor.has_capability(&name) {
                    return Err(Error::UnknownFunction(Ustr::from(name.as_str())));
                }
                let text = base.resolve_content(dirs)?;
                let args = Arguments::parse(&text).map_err(|reason| {
                    Error::InvalidArguments {
                        name: Ustr::from(name.as_str()),
                        text: text.clone(),
                        reason,
                    }
                })?;
                editor.invoke(&name, &args)
            }
            Action::If(_) => Ok(()),
        }
    }

    /// Write the action.  For <if>, only the active children are written,
    /// without the <if> itself.
    pub fn write_xml(&self, out: &mut String, indent: usize) -> Result<(), Error> {
        match self {
            Action::Insert { base, after } => {
                base.write_xml(out, indent, after.as_ref())
            }
            Action::Add(base)
            | Action::Replace(base)
            | Action::Delete(base)
            | Action::Function(base) => base.write_xml(out, indent, None),
            Action::If(cond) => {
                if Conditional::is_active(
                    cond.value1.text(),
                    cond.value2.text(),
                    cond.matches,
                ) {
                    for a in &cond.actions {
                        a.write_xml(out, indent)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::actions::{Action, Phase};
    use crate::editor::testing::RecordingEditor;
    use crate::errors::Error;
    use crate::files::File;
    use crate::template::TemplateContext;
    use crate::xml::parse_document;
    use ustr::Ustr;

    fn action(s: &str) -> Result<Action, Error> {
        Action::from_node(&parse_document(&File::new_from_str(s))?)
    }

    fn run_both(action: &Action) -> Result<(Vec<String>, Vec<String>), Error> {
        let dirs = TemplateContext::with_directories("out/scen", "out/base");
        let mut stat = RecordingEditor::new(None, "base", None);
        action.run(&mut stat, &dirs, Phase::Static)?;
        let mut dynamic = RecordingEditor::new(None, "base", None);
        action.run(&mut dynamic, &dirs, Phase::Dynamic)?;
        Ok((stat.calls, dynamic.calls))
    }

    #[test]
    fn phase_isolation() -> Result<(), Error> {
        let a = action("<add name='f'>a.xml</add>")?;
        let (stat, dynamic) = run_both(&a)?;
        assert_eq!(stat, ["add(f, a.xml)"]);
        assert!(dynamic.is_empty());

        let a = action(
            "<replace name='f' dynamic='1'>{scenarioDir}/a.xml</replace>",
        )?;
        let (stat, dynamic) = run_both(&a)?;
        assert!(stat.is_empty());
        assert_eq!(dynamic, ["update(f, out/scen/a.xml)"]);
        Ok(())
    }

    #[test]
    fn conditional() -> Result<(), Error> {
        let a = action(
            "<if value1='x' value2='x, y'>
                <add name='s'>s.xml</add>
                <delete name='d' dynamic='true'/>
             </if>",
        )?;
        let (stat, dynamic) = run_both(&a)?;
        assert_eq!(stat, ["add(s, s.xml)"]);
        assert_eq!(dynamic, ["delete(d)"]);

        let a = action(
            "<if value1='x' value2='x,y' matches='0'>
                <add name='s'>s.xml</add>
             </if>",
        )?;
        let (stat, dynamic) = run_both(&a)?;
        assert!(stat.is_empty());
        assert!(dynamic.is_empty());

        let a = action(
            "<if value1='z' value2='x,y' matches='0'>
                <insert name='s' after='t'>s.xml</insert>
             </if>",
        )?;
        let (stat, _) = run_both(&a)?;
        assert_eq!(stat, ["insert(s, s.xml, t)"]);
        Ok(())
    }

    #[test]
    fn formatting() -> Result<(), Error> {
        let mut a = action(
            "<if value1='{i}' value2='2'>
                <add name='f{i}'>p-{i}/{baselineDir}</add>
             </if>",
        )?;
        let mut ctx = TemplateContext::new();
        ctx.bind(Ustr::from("i"), "2");
        a.format_content(&ctx)?;
        let once = a.clone();
        a.format_content(&ctx)?;
        assert_eq!(a, once);

        let (stat, _) = run_both(&a)?;
        assert_eq!(stat, ["add(f2, p-2/out/base)"]);
        Ok(())
    }

    #[test]
    fn functions() -> Result<(), Error> {
        let a = action("<function name='record'>'a', n=1</function>")?;
        let (stat, _) = run_both(&a)?;
        assert_eq!(stat, ["record(\"a\", n=1)"]);

        let a = action("<function name='eval'>1</function>")?;
        assert!(matches!(run_both(&a), Err(Error::UnknownFunction(_))));

        let a = action("<function name='record'>print(1)</function>")?;
        assert!(matches!(run_both(&a), Err(Error::InvalidArguments { .. })));

        let a = action("<function name='fail'/>")?;
        assert!(matches!(run_both(&a), Err(Error::Editor(_))));
        Ok(())
    }

    fn load_error(s: &str) -> Error {
        match action(s) {
            Ok(a) => panic!("expected an error, got {:?}", a),
            Err(e) => e,
        }
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            load_error("<move name='x'/>").unlocated(),
            Error::UnknownTag(_)
        ));
        assert!(matches!(
            load_error("<add>a.xml</add>").unlocated(),
            Error::MissingAttribute { .. }
        ));
        assert!(matches!(
            load_error("<add name='x'/>").unlocated(),
            Error::MissingContent(..)
        ));
        assert!(matches!(
            load_error("<if value1='a'/>").unlocated(),
            Error::MissingAttribute { .. }
        ));
        assert_eq!(
            load_error("<if value1='a' value2='b'>\n  <add name='n' dynamic='2'>c</add>\n</if>")
                .to_string(),
            "line 2: <add name='n'>: invalid value '2' for attribute 'dynamic'"
        );
    }

    #[test]
    fn literal_braces() -> Result<(), Error> {
        let mut a = action("<add name='x'>{{a}}</add>")?;
        a.format_content(&TemplateContext::new())?;
        let (stat, _) = run_both(&a)?;
        assert_eq!(stat, ["add(x, {a})"]);

        let mut a = action("<function name='record'>'{{{i}}}'</function>")?;
        let mut ctx = TemplateContext::new();
        ctx.bind(Ustr::from("i"), "}");
        a.format_content(&ctx)?;
        let (stat, _) = run_both(&a)?;
        assert_eq!(stat, ["record(\"{}}\")"]);
        Ok(())
    }

    #[test]
    fn write_xml() -> Result<(), Error> {
        let mut out = String::new();
        action("<insert name='a' after='b'>x&lt;y</insert>")?
            .write_xml(&mut out, 1)?;
        action("<delete name='d' dynamic='1'/>")?.write_xml(&mut out, 1)?;
        action("<if value1='a' value2='b'><add name='n'>c</add></if>")?
            .write_xml(&mut out, 1)?;
        action("<if value1='a' value2='a'><add name='n'>c</add></if>")?
            .write_xml(&mut out, 1)?;
        assert_eq!(
            out,
            "   <insert name=\"a\" after=\"b\">x&lt;y</insert>\n   \
             <delete name=\"d\" dynamic=\"1\"/>\n   \
             <add name=\"n\">c</add>\n"
        );
        Ok(())
    }
}
