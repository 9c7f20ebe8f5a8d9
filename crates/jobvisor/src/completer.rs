use jobvisor_core::{CommandBuilder, FieldTrie, JobError, JobParams, OutputCollector, Supervisor};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Completes display-filter field names
///
/// The field listing is loaded from the analysis tool on first use, through
/// the wrapped supervisor, and kept for the completer's lifetime. If the tool
/// runs but yields nothing the completer serves no completions. Loading runs
/// in its own task, so a caller that gives up early does not abandon it.
pub struct FieldCompleter<B: CommandBuilder> {
    inner: Arc<Inner<B>>,
}

struct Inner<B: CommandBuilder> {
    loader: Supervisor<B>,
    fields: OnceCell<FieldTrie>,
}

static NO_FIELDS: FieldTrie = FieldTrie::new();

impl<B: CommandBuilder> FieldCompleter<B> {
    pub fn new(loader: Supervisor<B>) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                fields: OnceCell::new(),
            }),
        }
    }

    /// The loaded listing, or an empty one if it could not be loaded yet
    pub async fn fields(&self) -> &FieldTrie {
        if let Some(fields) = self.inner.fields.get() {
            return fields;
        }

        let inner = Arc::clone(&self.inner);
        let loading = tokio::spawn(async move {
            if let Err(e) = inner.fields.get_or_try_init(|| inner.load()).await {
                warn!("Field completion error: {}", e);
            }
        });
        if let Err(e) = loading.await {
            warn!("Loading the field listing failed: {}", e);
        }

        self.inner.fields.get().unwrap_or(&NO_FIELDS)
    }

    /// Sorted field names completing the last word of `prefix`
    pub async fn completions(&self, prefix: &str) -> Vec<String> {
        self.fields().await.completions(prefix)
    }
}

impl<B: CommandBuilder> Inner<B> {
    /// Run the listing job; `Err` only if the job could not be started
    async fn load(&self) -> Result<FieldTrie, JobError> {
        let (collector, done) = OutputCollector::channel();
        self.loader.start("", JobParams::FieldList, Arc::new(collector))?;

        let Ok(output) = done.await else {
            warn!("Field listing job ended without a result");
            return Ok(FieldTrie::default());
        };

        for e in &output.errors {
            warn!("Field completion error: {}", e);
        }

        match output.data {
            Some(listing) if output.success => {
                let fields = FieldTrie::parse(&listing);
                info!("Loaded {} protocols for field completion", fields.len());
                Ok(fields)
            }
            _ => {
                debug!("No field listing produced");
                Ok(FieldTrie::default())
            }
        }
    }
}
