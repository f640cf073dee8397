//! Default project scaffold.
//!
//! A freshly booted sandbox has an empty filesystem, but the first apply
//! cycle already expects an installable, runnable project. When no
//! `package.json` exists yet, this module seeds a minimal Vite + React
//! setup; generated files from later cycles layer on top of it.

use crate::error::Result;
use crate::runtime::{mount_failure, SandboxInstance};

const PACKAGE_JSON: &str = r#"{
  "name": "webuild-preview",
  "version": "1.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite --port 3000 --host",
    "build": "vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.2.0",
    "react-dom": "^18.2.0"
  },
  "devDependencies": {
    "@types/react": "^18.2.0",
    "@types/react-dom": "^18.2.0",
    "@vitejs/plugin-react": "^4.0.0",
    "typescript": "^5.0.0",
    "vite": "^4.4.0"
  }
}
"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite'
import react from '@vitejs/plugin-react'

export default defineConfig({
  plugins: [react()],
  server: {
    port: 3000,
    host: '0.0.0.0',
    strictPort: true
  },
  optimizeDeps: {
    include: ['react', 'react-dom']
  }
})
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>WeBuild Preview</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
"#;

const MAIN_TSX: &str = r#"import React from 'react'
import ReactDOM from 'react-dom/client'
import App from './App'

ReactDOM.createRoot(document.getElementById('root')!).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
)
"#;

const APP_TSX: &str = r#"import React from 'react'

function App() {
  return (
    <div style={{ padding: '20px', fontFamily: 'system-ui' }}>
      <h1>WeBuild Preview</h1>
      <p>Your application will appear here.</p>
    </div>
  )
}

export default App
"#;

/// Seed the default project files unless a project is already present.
///
/// `package.json` is the sentinel: when it exists the workspace is
/// considered initialized and nothing is touched. `src/main.tsx` and
/// `src/App.tsx` are individually write-if-missing so a partial scaffold
/// is completed rather than overwritten.
pub(crate) async fn ensure_scaffold(instance: &mut dyn SandboxInstance) -> Result<()> {
    if instance.read_file("package.json").await.is_ok() {
        tracing::debug!("project already scaffolded");
        return Ok(());
    }

    tracing::info!("seeding default project scaffold");

    write(instance, "package.json", PACKAGE_JSON).await?;
    write(instance, "vite.config.ts", VITE_CONFIG).await?;
    write(instance, "index.html", INDEX_HTML).await?;

    instance
        .mkdir_all("src")
        .await
        .map_err(|e| mount_failure("src", e))?;

    for (path, content) in [("src/main.tsx", MAIN_TSX), ("src/App.tsx", APP_TSX)] {
        if instance.read_file(path).await.is_err() {
            write(instance, path, content).await?;
        }
    }

    Ok(())
}

async fn write(instance: &mut dyn SandboxInstance, path: &str, content: &str) -> Result<()> {
    instance
        .write_file(path, content)
        .await
        .map_err(|e| mount_failure(path, e))?;
    tracing::debug!(path = %path, bytes = content.len(), "scaffold file written");
    Ok(())
}
