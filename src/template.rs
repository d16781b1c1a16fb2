/// Placeholder substitution and iterator expansion.
///
/// Text in setup documents can reference iterators with `{name}`.  The
/// directory placeholders `{scenarioDir}` and `{baselineDir}` are bound to
/// themselves while expanding templates, so they survive until the scenario
/// is run and the directories are known.  `{{` and `}}` are literal braces;
/// they stay escaped while expanding, so that the text can be formatted
/// again with the directories.
use crate::errors::Error;
use crate::iterator::ValueIterator;
use indexmap::IndexMap;
use ustr::{Ustr, UstrMap};

lazy_static::lazy_static! {
    pub static ref SCENARIO_DIR: Ustr = Ustr::from("scenarioDir");
    pub static ref BASELINE_DIR: Ustr = Ustr::from("baselineDir");
}

/// Maps placeholder names to their current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateContext {
    values: UstrMap<String>,
    deferred: bool, // output is formatted again at run time
}

impl TemplateContext {
    /// A context for expanding templates.  Directories are deferred until
    /// run time.
    pub fn new() -> Self {
        let mut ctx = TemplateContext {
            deferred: true,
            ..Default::default()
        };
        ctx.bind(*SCENARIO_DIR, "{scenarioDir}");
        ctx.bind(*BASELINE_DIR, "{baselineDir}");
        ctx
    }

    /// A context holding the directories of a scenario being run.
    pub fn with_directories(scenario_dir: &str, baseline_dir: &str) -> Self {
        let mut ctx = TemplateContext::default();
        ctx.bind(*SCENARIO_DIR, scenario_dir);
        ctx.bind(*BASELINE_DIR, baseline_dir);
        ctx
    }

    /// Set the value of a placeholder, replacing any previous value
    pub fn bind<T: Into<String>>(&mut self, name: Ustr, value: T) {
        self.values.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&Ustr::from(name)).map(String::as_str)
    }

    fn is_directory(name: Ustr) -> bool {
        name == *SCENARIO_DIR || name == *BASELINE_DIR
    }

    /// Replace all placeholders in `text`.  While expanding templates, the
    /// result is still a template: literal braces, including those coming
    /// from iterator values, are kept escaped.
    pub fn format(&self, text: &str) -> Result<String, Error> {
        self.substitute(text, self.deferred)
    }

    /// Replace all placeholders in `text`, for text that is never formatted
    /// again (group and scenario names).
    pub fn format_name(&self, text: &str) -> Result<String, Error> {
        self.substitute(text, false)
    }

    fn substitute(&self, text: &str, keep_escapes: bool) -> Result<String, Error> {
        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' | '}' if chars.peek() == Some(&c) => {
                    chars.next();
                    result.push(c);
                    if keep_escapes {
                        result.push(c);
                    }
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            None => {
                                return Err(Error::InvalidFormat {
                                    format: text.to_string(),
                                    reason: "unterminated '{'".into(),
                                })
                            }
                            Some('}') => break,
                            Some(c) => name.push(c),
                        }
                    }
                    let name = Ustr::from(name.as_str());
                    match self.values.get(&name) {
                        Some(v) if keep_escapes && !Self::is_directory(name) => {
                            result.push_str(&v.replace('{', "{{").replace('}', "}}"))
                        }
                        Some(v) => result.push_str(v),
                        None => {
                            return Err(Error::UnknownPlaceholder(
                                name.to_string(),
                                text.to_string(),
                            ))
                        }
                    }
                }
                '}' => {
                    return Err(Error::InvalidFormat {
                        format: text.to_string(),
                        reason: "single '}' encountered".into(),
                    })
                }
                c => result.push(c),
            }
        }
        Ok(result)
    }
}

/// A piece of text from the setup document, and its formatted value.
/// Formatting applies to the result of the previous formatting (so that
/// iterators can be replaced first, and directories later), but formatting
/// twice with the same context is a no-op.
#[derive(Clone, Debug, PartialEq)]
pub struct Formatted {
    raw: String,
    formatted: Option<String>,
    context: Option<TemplateContext>, // last context used for formatting
}

impl Formatted {
    pub fn new<T: Into<String>>(raw: T) -> Self {
        Formatted {
            raw: raw.into(),
            formatted: None,
            context: None,
        }
    }

    /// The text as read from the document
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The formatted text if available, the raw text otherwise
    pub fn text(&self) -> &str {
        self.formatted.as_deref().unwrap_or(&self.raw)
    }

    pub fn format(&mut self, ctx: &TemplateContext) -> Result<(), Error> {
        if self.context.as_ref() == Some(ctx) {
            return Ok(());
        }
        self.formatted = Some(ctx.format(self.text())?);
        self.context = Some(ctx.clone());
        Ok(())
    }

    /// Format the current text with `ctx`, without modifying self.
    pub fn resolve(&self, ctx: &TemplateContext) -> Result<String, Error> {
        ctx.format(self.text())
    }
}

/// Split an `iterator` attribute, which may name several comma-separated
/// iterators.
pub fn split_iterator_names(attr: Option<&str>) -> Vec<Ustr> {
    attr.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(Ustr::from)
            .collect()
    })
    .unwrap_or_default()
}

/// Generalized nested loop over the values of several iterators.  The first
/// name is the outermost loop.  At each level the value of the iterator is
/// bound in `context`, and `expand` is called once per combination at the
/// innermost level.  With no names, `expand` is called once with the context
/// unchanged.
///
/// The context is shared by all levels and overwritten on each iteration, so
/// `expand` must have read everything it needs from it before returning.
/// Running expansions in parallel would require one copy of the context per
/// branch.
pub fn iterate_list<F>(
    iterators: &IndexMap<Ustr, ValueIterator>,
    context: &mut TemplateContext,
    names: &[Ustr],
    expand: &mut F,
) -> Result<(), Error>
where
    F: FnMut(&mut TemplateContext) -> Result<(), Error>,
{
    let Some((first, others)) = names.split_first() else {
        return expand(context);
    };
    let iterator = iterators
        .get(first)
        .ok_or(Error::UnknownIterator(*first))?;

    for value in iterator.values() {
        context.bind(*first, value.as_str());
        iterate_list(iterators, context, others, expand)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::errors::Error;
    use crate::iterator::ValueIterator;
    use crate::template::{
        iterate_list, split_iterator_names, Formatted, TemplateContext,
    };
    use indexmap::IndexMap;
    use ustr::Ustr;

    fn iterators(
        lists: &[(&str, &str)],
    ) -> Result<IndexMap<Ustr, ValueIterator>, Error> {
        let mut map = IndexMap::new();
        for (name, values) in lists {
            let it = ValueIterator::new_list(Ustr::from(*name), values)?;
            map.insert(it.name(), it);
        }
        Ok(map)
    }

    #[test]
    fn substitution() -> Result<(), Error> {
        let mut ctx = TemplateContext::new();
        ctx.bind(Ustr::from("i"), "3");
        assert_eq!(ctx.format("a-{i}")?, "a-3");
        assert_eq!(ctx.format("{scenarioDir}/x")?, "{scenarioDir}/x");
        assert_eq!(ctx.format("{{i}} {i}")?, "{{i}} 3");
        assert_eq!(ctx.format_name("{{i}} {i}")?, "{i} 3");

        let dirs = TemplateContext::with_directories("d", "b");
        assert_eq!(dirs.format("{{i}} {scenarioDir}")?, "{i} d");
        match ctx.format("{j}") {
            Err(e) => assert_eq!(e.to_string(), "Unknown placeholder {j} in \"{j}\""),
            Ok(s) => panic!("unexpected {}", s),
        }
        assert!(ctx.format("{i").is_err());
        assert!(ctx.format("i}").is_err());
        Ok(())
    }

    #[test]
    fn idempotent_formatting() -> Result<(), Error> {
        let mut ctx = TemplateContext::new();
        ctx.bind(Ustr::from("i"), "{{");
        let mut f = Formatted::new("v{i}-{scenarioDir}");
        f.format(&ctx)?;
        assert_eq!(f.text(), "v{{{{-{scenarioDir}");
        f.format(&ctx)?;
        assert_eq!(f.text(), "v{{{{-{scenarioDir}");
        assert_eq!(f.raw(), "v{i}-{scenarioDir}");

        let dirs = TemplateContext::with_directories("out/s", "out/b");
        assert_eq!(f.resolve(&dirs)?, "v{{-out/s");

        let mut f = Formatted::new("{scenarioDir}/{baselineDir}");
        f.format(&TemplateContext::new())?;
        assert_eq!(f.resolve(&dirs)?, "out/s/out/b");
        assert_eq!(f.text(), "{scenarioDir}/{baselineDir}");
        Ok(())
    }

    #[test]
    fn literal_braces_survive_expansion() -> Result<(), Error> {
        let mut ctx = TemplateContext::new();
        ctx.bind(Ustr::from("a"), "1");
        let mut f = Formatted::new("{{a}}-{a}-{scenarioDir}");
        f.format(&ctx)?;
        assert_eq!(f.text(), "{{a}}-1-{scenarioDir}");

        let dirs = TemplateContext::with_directories("out/s", "out/b");
        assert_eq!(f.resolve(&dirs)?, "{a}-1-out/s");
        let mut f2 = f.clone();
        f2.format(&dirs)?;
        assert_eq!(f2.text(), "{a}-1-out/s");
        Ok(())
    }

    #[test]
    fn cross_product_order() -> Result<(), Error> {
        let iters = iterators(&[("X", "1,2"), ("Y", "a,b")])?;
        let mut ctx = TemplateContext::new();
        let mut seen = Vec::new();
        iterate_list(
            &iters,
            &mut ctx,
            &split_iterator_names(Some("X, Y")),
            &mut |ctx| {
                seen.push(ctx.format("{X}{Y}")?);
                Ok(())
            },
        )?;
        assert_eq!(seen, ["1a", "1b", "2a", "2b"]);

        let mut count = 0;
        iterate_list(&iters, &mut ctx, &[], &mut |_| {
            count += 1;
            Ok(())
        })?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[test]
    fn unknown_iterator() -> Result<(), Error> {
        let iters = iterators(&[("X", "1")])?;
        let mut ctx = TemplateContext::new();
        let res = iterate_list(
            &iters,
            &mut ctx,
            &[Ustr::from("Z")],
            &mut |_| Ok(()),
        );
        assert_eq!(
            res.map(|_| ()).unwrap_err().to_string(),
            "Iterator 'Z' is not defined"
        );
        Ok(())
    }
}
