use crate::actor::{Actor, Context};
use anyhow::Result;
use quill_agent::ArticleGenerator;
use quill_common::{GeneratedArticle, Keyword, QuillError};
use std::sync::Arc;
use tokio::{sync::oneshot, task::JoinHandle};

pub type ArticleReply = oneshot::Sender<quill_common::Result<GeneratedArticle>>;

pub enum ArticleMsg {
    /// Start a generation; the result arrives on `reply`.
    Generate { keyword: Keyword, reply: ArticleReply },
    /// Abort the running generation, if any.
    Cancel,
    /// Whether a generation is currently running.
    IsBusy { reply: oneshot::Sender<bool> },
}

/// Runs one article generation at a time off the caller's task.
pub struct ArticleActor {
    generator: Arc<ArticleGenerator>,
    running: Option<JoinHandle<()>>,
}

impl ArticleActor {
    pub fn new(generator: Arc<ArticleGenerator>) -> Self {
        Self {
            generator,
            running: None,
        }
    }

    fn busy(&self) -> bool {
        self.running.as_ref().is_some_and(|h| !h.is_finished())
    }
}

#[async_trait::async_trait]
impl Actor for ArticleActor {
    type Msg = ArticleMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            ArticleMsg::Generate { keyword, reply } => {
                if self.busy() {
                    tracing::warn!(keyword = %keyword, "article.actor.busy");
                    let _ = reply.send(Err(QuillError::Agent(
                        "a generation is already running".into(),
                    )));
                    return Ok(());
                }
                let generator = self.generator.clone();
                self.running = Some(tokio::spawn(async move {
                    let result = generator.generate(&keyword).await;
                    if reply.send(result).is_err() {
                        tracing::debug!(keyword = %keyword, "article.actor.reply_dropped");
                    }
                }));
            }
            ArticleMsg::Cancel => {
                if let Some(handle) = self.running.take() {
                    handle.abort();
                    tracing::info!("article.actor.cancelled");
                }
            }
            ArticleMsg::IsBusy { reply } => {
                let _ = reply.send(self.busy());
            }
        }
        Ok(())
    }
}

impl Drop for ArticleActor {
    fn drop(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.abort();
        }
    }
}
