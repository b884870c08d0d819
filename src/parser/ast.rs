use pest::Span;

/// Lexical token as produced by the grammar, before key lookup and value coercion
#[derive(Debug, Clone, PartialEq)]
pub enum RawToken<'a> {
    Spaces(Span<'a>),
    Boolean(Span<'a>),
    Group(RawGroup<'a>),
    // unbalanced parens, never part of a group
    ParenOpen(Span<'a>),
    ParenClose(Span<'a>),
    // a matched paren nested past the group depth limit
    DeepParen(Span<'a>),
    Filter(RawFilter<'a>),
    FreeText(RawFreeText<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawGroup<'a> {
    pub span: Span<'a>,
    pub open: Span<'a>,
    pub inner: Vec<RawToken<'a>>,
    pub close: Span<'a>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFilter<'a> {
    pub span: Span<'a>,
    pub negation: Option<Span<'a>>,
    pub key: RawKey<'a>,
    pub separator: Span<'a>,
    pub operator: Option<Span<'a>>,
    pub value: Option<RawValue<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawKey<'a> {
    Simple(Span<'a>),
    ExplicitTag {
        span: Span<'a>,
        name: Span<'a>,
    },
    Aggregate {
        span: Span<'a>,
        name: Span<'a>,
        args: Vec<Span<'a>>,
    },
}

impl<'a> RawKey<'a> {
    pub fn span(&self) -> Span<'a> {
        match self {
            RawKey::Simple(span)
            | RawKey::ExplicitTag { span, .. }
            | RawKey::Aggregate { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue<'a> {
    Bare(Span<'a>),
    // inner excludes the quotes; escapes are preserved
    Quoted {
        span: Span<'a>,
        inner: Span<'a>,
        terminated: bool,
    },
    List {
        span: Span<'a>,
        entries: Vec<RawListEntry<'a>>,
    },
}

impl<'a> RawValue<'a> {
    pub fn span(&self) -> Span<'a> {
        match self {
            RawValue::Bare(span) | RawValue::Quoted { span, .. } | RawValue::List { span, .. } => {
                *span
            }
        }
    }
}

/// One comma-separated slot of a list value, including its surrounding whitespace
#[derive(Debug, Clone, PartialEq)]
pub struct RawListEntry<'a> {
    pub span: Span<'a>,
    pub item: Option<RawListItem<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawListItem<'a> {
    Bare(Span<'a>),
    Quoted { span: Span<'a>, inner: Span<'a> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawFreeText<'a> {
    Word(Span<'a>),
    Quoted {
        span: Span<'a>,
        inner: Span<'a>,
        terminated: bool,
    },
}

impl<'a> RawToken<'a> {
    /// Convert to test-friendly token without spans
    pub fn to_test_token(&self) -> test_utils::RawTestToken<'a> {
        use test_utils::RawTestToken;
        match self {
            RawToken::Spaces(span) => RawTestToken::Spaces(span.as_str()),
            RawToken::Boolean(span) => RawTestToken::Boolean(span.as_str()),
            RawToken::Group(group) => {
                RawTestToken::Group(group.inner.iter().map(|t| t.to_test_token()).collect())
            }
            RawToken::ParenOpen(_) => RawTestToken::ParenOpen,
            RawToken::ParenClose(_) => RawTestToken::ParenClose,
            RawToken::DeepParen(span) => RawTestToken::DeepParen(span.as_str()),
            RawToken::Filter(filter) => RawTestToken::Filter {
                negated: filter.negation.is_some(),
                key: filter.key.span().as_str(),
                operator: filter.operator.map(|op| op.as_str()),
                value: filter.value.as_ref().map(|v| v.span().as_str()),
            },
            RawToken::FreeText(RawFreeText::Word(span)) => RawTestToken::FreeText(span.as_str()),
            RawToken::FreeText(RawFreeText::Quoted { span, .. }) => {
                RawTestToken::FreeText(span.as_str())
            }
        }
    }
}

pub mod test_utils {
    #[derive(Debug, Clone, PartialEq)]
    pub enum RawTestToken<'a> {
        Spaces(&'a str),
        Boolean(&'a str),
        Group(Vec<RawTestToken<'a>>),
        ParenOpen,
        ParenClose,
        DeepParen(&'a str),
        Filter {
            negated: bool,
            key: &'a str,
            operator: Option<&'a str>,
            value: Option<&'a str>,
        },
        FreeText(&'a str),
    }

    impl<'a> RawTestToken<'a> {
        /// Helper constructor for a `key:value` filter without operator
        pub fn filter(key: &'a str, value: &'a str) -> Self {
            RawTestToken::Filter {
                negated: false,
                key,
                operator: None,
                value: Some(value),
            }
        }

        /// Helper constructor for a `key:<op>value` filter
        pub fn compare(key: &'a str, operator: &'a str, value: &'a str) -> Self {
            RawTestToken::Filter {
                negated: false,
                key,
                operator: Some(operator),
                value: Some(value),
            }
        }

        /// Helper constructor for a `!key:value` filter
        pub fn negated(key: &'a str, value: &'a str) -> Self {
            RawTestToken::Filter {
                negated: true,
                key,
                operator: None,
                value: Some(value),
            }
        }

        pub fn text(text: &'a str) -> Self {
            RawTestToken::FreeText(text)
        }

        pub fn space() -> Self {
            RawTestToken::Spaces(" ")
        }
    }
}
