use std::borrow::Cow;

use indicatif::ProgressBar;

pub trait ProgressRenderedText {
    fn msg(&self) -> String;
}

/// Where progress messages go: plain stdout or a live spinner
#[derive(Debug, Default)]
pub enum ProgressRenderer {
    #[default]
    Std,
    Indicatif(ProgressBar),
}

impl ProgressRenderer {
    pub fn println(&self, msg: impl Into<Cow<'static, str>>) {
        match self {
            Self::Std => println!("{}", msg.into()),
            Self::Indicatif(pb) => pb.println(msg.into()),
        }
    }

    /// Message shown next to the spinner; printed as a line without one
    pub fn set_message(&self, msg: impl Into<Cow<'static, str>>) {
        match self {
            Self::Std => println!("{}", msg.into()),
            Self::Indicatif(pb) => pb.set_message(msg),
        }
    }

    pub fn finish_and_clear(&self) {
        if let Self::Indicatif(pb) = self {
            pb.finish_and_clear();
        }
    }
}

impl From<ProgressBar> for ProgressRenderer {
    fn from(pb: ProgressBar) -> Self {
        Self::Indicatif(pb)
    }
}
